//! Async module: pass-through to a runtime's own transport.

use super::FreeOnDrop;
use crate::error::{MarshalError, RuntimeError};
use crate::events::{EventBus, EventSink};
use crate::ffi::*;
use crate::loader::AbiModule;
use crate::options::{ExecutionOptions, NativeAllocator};
use crate::types::TypeRegistry;
use std::ffi::CString;
use std::{ptr, slice};

native_fns! {
    pub struct AsyncFns: AbiModule::Async {
        connect: "ecsact_async_connect" => AsyncConnectFn,
        disconnect: "ecsact_async_disconnect" => AsyncDisconnectFn,
        flush_events: "ecsact_async_flush_events" => AsyncFlushEventsFn,
        enqueue_execution_options: "ecsact_async_enqueue_execution_options" => AsyncEnqueueFn,
    }
}

/// Async facade borrowed from a runtime.
pub struct Async<'r> {
    fns: &'r AsyncFns,
    events: &'r mut EventBus,
    types: &'r TypeRegistry,
}

impl<'r> Async<'r> {
    pub(crate) fn new(fns: &'r AsyncFns, events: &'r mut EventBus, types: &'r TypeRegistry) -> Self {
        Self { fns, events, types }
    }

    /// Returns the request id assigned by the runtime.
    pub fn connect(&self, address: &str) -> Result<i32, RuntimeError> {
        let f = self.fns.connect.get()?;
        let address = CString::new(address)?;
        Ok(unsafe { f(address.as_ptr()) })
    }

    pub fn disconnect(&self) -> Result<(), RuntimeError> {
        let f = self.fns.disconnect.get()?;
        unsafe { f() };
        Ok(())
    }

    /// Deliver queued component events to the runtime's [`EventBus`].
    pub fn flush_events(&mut self) -> Result<(), RuntimeError> {
        let f = self.fns.flush_events.get()?;
        let mut sink = EventSink::new(self.events, self.types);
        let collector = sink.collector();
        unsafe { f(&collector, ptr::null()) };
        let errors: Vec<MarshalError> = sink.into_errors();
        match errors.into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Queue a batch for a future tick. The runtime copies the arrays, so the
    /// batch is freed before this returns.
    pub fn enqueue_execution_options<A: NativeAllocator>(
        &self,
        options: &mut ExecutionOptions<A>,
    ) -> Result<i32, RuntimeError> {
        let f = self.fns.enqueue_execution_options.get()?;
        let mut batch = FreeOnDrop(slice::from_mut(options));
        let raw = *batch.0[0].alloc()?;
        let request = unsafe { f(raw) };
        drop(batch);
        Ok(request)
    }
}
