use std::sync::Arc;

use bytes::Bytes;
use cwasm_format::Format;
use tracing::debug;

use crate::config::InterpConfig;
use crate::driver::Decompressor;
use crate::error::InterpError;
use crate::hook::ActionHook;
use crate::state::{DriverState, ResumeOutcome};

/// Owning handle with an explicit `destroy`.
///
/// Hosts that hand the decompressor across an opaque boundary keep this
/// instead of the driver itself. After [`destroy`](Self::destroy) every
/// call fails with [`InterpError::DisposedHandle`] rather than touching
/// freed state, and destroying twice is harmless.
#[derive(Debug)]
pub struct DecompressorHandle {
    inner: Option<Box<Decompressor>>,
}

impl DecompressorHandle {
    #[must_use]
    pub fn create(format: Arc<Format>, config: InterpConfig) -> Self {
        Self {
            inner: Some(Box::new(Decompressor::new(format, config))),
        }
    }

    fn live(&mut self) -> Result<&mut Decompressor, InterpError> {
        self.inner.as_deref_mut().ok_or(InterpError::DisposedHandle)
    }

    /// # Errors
    ///
    /// [`InterpError::DisposedHandle`] after `destroy`.
    pub fn set_action_hook(&mut self, hook: impl ActionHook + 'static) -> Result<(), InterpError> {
        self.live()?.set_action_hook(hook);
        Ok(())
    }

    /// # Errors
    ///
    /// [`InterpError::DisposedHandle`] after `destroy`, otherwise as
    /// [`Decompressor::supply_input`].
    pub fn supply_input(&mut self, bytes: &[u8]) -> Result<(), InterpError> {
        self.live()?.supply_input(bytes)
    }

    /// # Errors
    ///
    /// [`InterpError::DisposedHandle`] after `destroy`, otherwise as
    /// [`Decompressor::close_input`].
    pub fn close_input(&mut self) -> Result<(), InterpError> {
        self.live()?.close_input()
    }

    /// # Errors
    ///
    /// [`InterpError::DisposedHandle`] after `destroy`. Driver failures
    /// are reported as [`ResumeOutcome::Failed`], not as `Err`.
    pub fn resume(&mut self) -> Result<ResumeOutcome, InterpError> {
        Ok(self.live()?.resume())
    }

    /// # Errors
    ///
    /// [`InterpError::DisposedHandle`] after `destroy`, otherwise as
    /// [`Decompressor::request_output_buffer`].
    pub fn drain_output(&mut self, max: usize) -> Result<Bytes, InterpError> {
        self.live()?.request_output_buffer(max)
    }

    /// # Errors
    ///
    /// [`InterpError::DisposedHandle`] after `destroy`.
    pub fn state(&self) -> Result<&DriverState, InterpError> {
        self.inner
            .as_deref()
            .map(Decompressor::state)
            .ok_or(InterpError::DisposedHandle)
    }

    /// Release the driver and everything it owns.
    pub fn destroy(&mut self) {
        if let Some(driver) = self.inner.take() {
            debug!(state = %driver.state(), steps = driver.steps(), "destroyed decompressor handle");
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }
}
