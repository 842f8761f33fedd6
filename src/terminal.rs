//! The terminal byte pipeline over the selected characteristic.
//!
//! Outgoing input is written one character at a time, each write awaited for
//! confirmation before the next is issued. Confirmed characters are echoed
//! into the append-only response log; inbound notification payloads land in
//! the same log. Both appends happen on the owner context, so interleaving
//! follows the order in which completions were observed.

use std::sync::Arc;

use log::debug;

use crate::codec;
use crate::error::BleError;
use crate::platform::CharacteristicHandle;

#[derive(Default)]
pub struct TerminalChannel {
    target: Option<Arc<dyn CharacteristicHandle>>,
    input: String,
    response: String,
}

impl TerminalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the write pipeline at a characteristic, or detaches it.
    pub fn set_target(&mut self, target: Option<Arc<dyn CharacteristicHandle>>) {
        self.target = target;
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Appends operator input to the pending buffer.
    pub fn push_input(&mut self, text: &str) {
        self.input.push_str(text);
    }

    /// Drains the input buffer through the target characteristic, one
    /// character per write.
    ///
    /// Write N+1 is never issued before write N's outcome is known. A
    /// character the characteristic cannot take (unsupported operation or
    /// access denied) is skipped without aborting the rest of the sequence;
    /// confirmed characters are echoed into the response log. Without a
    /// target the input is left untouched.
    pub async fn transmit(&mut self) -> Result<(), BleError> {
        let Some(target) = self.target.clone() else {
            return Ok(());
        };
        if self.input.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.input);
        for ch in pending.chars() {
            let bytes = codec::encode_char(ch);
            match target.write_value(&bytes).await {
                Ok(()) => self.response.push(ch),
                Err(e) if e.is_skippable_write_failure() => {
                    debug!("skipping unwritable character {:?}: {}", ch, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Appends an inbound notification payload to the response log.
    pub fn push_notification(&mut self, payload: &[u8]) {
        self.response.push_str(&codec::decode(payload));
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn clear_response(&mut self) {
        self.response.clear();
    }
}
