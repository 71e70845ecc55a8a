//! Registry of all known sources, keyed by their stable bit position.

use router_types::{Asset, SourceId, SourceMask, SwapQuery, MAX_SOURCE_ID};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::SourceInterface;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
	/// Two sources claimed the same bit position.
	#[error("Source {0} already registered")]
	DuplicateSource(SourceId),
	/// The bit position is past the highest one a registry accepts.
	#[error("Source {0} is out of range, ids go up to {max}", max = MAX_SOURCE_ID)]
	IdOutOfRange(SourceId),
	/// No registered source can trade the pair, regardless of masks.
	#[error("No registered source supports {from} -> {dest}")]
	UnsupportedAsset { from: Asset, dest: Asset },
}

/// Fixed table of sources. Built once at startup, then shared immutably
/// behind an `Arc`; adding a source means building a new registry.
#[derive(Default)]
pub struct SourceRegistry {
	slots: Vec<Option<Arc<dyn SourceInterface>>>,
}

impl SourceRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a source at bit position `id`.
	pub fn register(
		&mut self,
		id: SourceId,
		source: Arc<dyn SourceInterface>,
	) -> Result<(), RegistryError> {
		if !id.is_valid() {
			return Err(RegistryError::IdOutOfRange(id));
		}
		let index = id.index();
		if self.slots.len() <= index {
			self.slots.resize_with(index + 1, || None);
		}
		if self.slots[index].is_some() {
			return Err(RegistryError::DuplicateSource(id));
		}

		debug!("Registered source {} ({})", id, source.info().name);
		self.slots[index] = Some(source);
		Ok(())
	}

	/// Builder form of [`register`](Self::register).
	pub fn with_source(
		mut self,
		id: SourceId,
		source: Arc<dyn SourceInterface>,
	) -> Result<Self, RegistryError> {
		self.register(id, source)?;
		Ok(self)
	}

	/// Length of every distribution vector: highest id plus one.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// True when no source has been registered.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Source at `id`, if that bit position is occupied.
	pub fn get(&self, id: SourceId) -> Option<&Arc<dyn SourceInterface>> {
		self.slots.get(id.index()).and_then(|slot| slot.as_ref())
	}

	/// Registered sources in ascending id order.
	pub fn iter(&self) -> impl Iterator<Item = (SourceId, &Arc<dyn SourceInterface>)> {
		self.slots
			.iter()
			.enumerate()
			.filter_map(|(i, slot)| slot.as_ref().map(|s| (SourceId(i as u32), s)))
	}

	/// Sources that can trade the pair, ignoring any mask.
	pub fn supported_sources(&self, from: Asset, dest: Asset) -> Vec<SourceId> {
		self.iter()
			.filter(|(_, source)| source.supports_pair(from, dest))
			.map(|(id, _)| id)
			.collect()
	}

	/// Sources enabled for the pair after applying `flags` and `disabled`,
	/// in ascending id order.
	///
	/// Fails only when nothing supports the pair at all; a mask that
	/// disables every supporting source yields an empty list.
	pub fn active_sources(
		&self,
		from: Asset,
		dest: Asset,
		flags: &SourceMask,
		disabled: &BTreeSet<SourceId>,
	) -> Result<Vec<SourceId>, RegistryError> {
		let supported = self.supported_sources(from, dest);
		if supported.is_empty() {
			return Err(RegistryError::UnsupportedAsset { from, dest });
		}

		let active: Vec<SourceId> = supported
			.into_iter()
			.filter(|id| !flags.is_disabled(*id) && !disabled.contains(id))
			.collect();

		debug!(
			"{} -> {}: {} active source(s) under {}",
			from,
			dest,
			active.len(),
			flags
		);
		Ok(active)
	}

	/// [`active_sources`](Self::active_sources) for one hop query.
	pub fn active_for(
		&self,
		from: Asset,
		query: &SwapQuery,
	) -> Result<Vec<SourceId>, RegistryError> {
		self.active_sources(from, query.dest, &query.flags, &query.disabled_sources)
	}
}

impl std::fmt::Debug for SourceRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list()
			.entries(self.iter().map(|(id, s)| (id, s.info().name.clone())))
			.finish()
	}
}
