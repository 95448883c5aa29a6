//! Event logging hook

use super::HookResult;
use crate::host::HostCore;
use log::debug;

/// Contract events
pub trait LoggingHooks {
    /// Record an event emitted by the running contract
    ///
    /// # Arguments
    /// * `identifier` - Event identifier
    /// * `topics` - Indexed topics
    /// * `data` - Payload
    fn write_log(&mut self, identifier: &[u8], topics: &[Vec<u8>], data: &[u8]) -> HookResult<()>;
}

impl LoggingHooks for HostCore {
    fn write_log(&mut self, identifier: &[u8], topics: &[Vec<u8>], data: &[u8]) -> HookResult<()> {
        let length = topics
            .iter()
            .fold(identifier.len().saturating_add(data.len()), |total, topic| {
                total.saturating_add(topic.len())
            });
        let costs = self.metering.gas_cost();
        let (base, per_byte) = (costs.api_cost.log, costs.base_operation_cost.data_copy_per_byte);
        self.charge_with_data(base, per_byte, length)?;

        let address = self.runtime.sc_address();
        if self.debug_mode {
            debug!(
                "contract log from {}: {} topics={} data={}",
                hex::encode(address),
                String::from_utf8_lossy(identifier),
                topics.len(),
                hex::encode(data)
            );
        }
        self.output
            .write_log(address, identifier.to_vec(), topics.to_vec(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::test_core;
    use crate::types::VmInput;

    #[test]
    fn test_log_recorded_in_both_modes() {
        for debug_mode in [false, true] {
            let mut core = test_core();
            core.debug_mode = debug_mode;
            core.metering.init_state_from_input(&VmInput {
                gas_provided: 1_000,
                ..VmInput::default()
            });

            core.write_log(b"transfer", &[b"from".to_vec()], b"payload").unwrap();
            assert_eq!(core.output.log_count(), 1);
        }
    }
}
