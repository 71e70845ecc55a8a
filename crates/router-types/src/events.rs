use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::Asset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RouterEvent {
	Quote(QuoteEvent),
	Execution(ExecutionEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QuoteEvent {
	QuoteComputed {
		from: Asset,
		dest: Asset,
		amount: U256,
		return_amount: U256,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
	SwapExecuted {
		execution_id: String,
		actual_return: U256,
	},
	SwapRolledBack {
		execution_id: String,
		reason: String,
	},
	RollbackFailed {
		execution_id: String,
		reason: String,
	},
}

pub struct EventBus {
	sender: broadcast::Sender<RouterEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
		self.sender.subscribe()
	}

	/// Publishes to current subscribers. Having none is not an error.
	pub fn publish(&self, event: RouterEvent) {
		let _ = self.sender.send(event);
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_publish_reaches_subscriber() {
		let bus = EventBus::new(8);
		let mut rx = bus.subscribe();

		bus.publish(RouterEvent::Execution(ExecutionEvent::SwapExecuted {
			execution_id: "abc".into(),
			actual_return: U256::from(5),
		}));

		match rx.recv().await.unwrap() {
			RouterEvent::Execution(ExecutionEvent::SwapExecuted { execution_id, .. }) => {
				assert_eq!(execution_id, "abc")
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_publish_without_subscribers() {
		let bus = EventBus::new(8);
		bus.publish(RouterEvent::Execution(ExecutionEvent::SwapRolledBack {
			execution_id: "abc".into(),
			reason: "slippage".into(),
		}));
	}
}
