//! Browser websocket transport.
//!
//! Events are collected by the socket's callbacks and must be polled via
//! `poll_events()`.

use std::cell::RefCell;
use std::rc::Rc;

use url::Url;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use super::{Transport, TransportEvent};
use crate::error::{SyncError, SyncResult};

/// Websocket transport for WASM.
pub struct WasmTransport {
    ws: Option<WebSocket>,
    events: Rc<RefCell<Vec<TransportEvent>>>,
    // Store closures to prevent them from being dropped
    _on_open: Option<Closure<dyn Fn()>>,
    _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
    _on_close: Option<Closure<dyn Fn(CloseEvent)>>,
    _on_error: Option<Closure<dyn Fn(ErrorEvent)>>,
}

impl WasmTransport {
    /// Create a transport with no connection.
    pub fn new() -> Self {
        Self {
            ws: None,
            events: Rc::new(RefCell::new(Vec::new())),
            _on_open: None,
            _on_message: None,
            _on_close: None,
            _on_error: None,
        }
    }
}

impl Default for WasmTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WasmTransport {
    fn connect(&mut self, url: &Url) -> SyncResult<()> {
        if self.ws.is_some() {
            return Err(SyncError::Construction("Already connected".to_string()));
        }

        let ws = WebSocket::new(url.as_str())
            .map_err(|e| SyncError::Construction(format!("Failed to create WebSocket: {:?}", e)))?;
        ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

        let events_open = self.events.clone();
        let on_open = Closure::wrap(Box::new(move || {
            events_open.borrow_mut().push(TransportEvent::Opened);
        }) as Box<dyn Fn()>);
        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let events_msg = self.events.clone();
        let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
            // Binary frames are not part of the protocol.
            if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                events_msg
                    .borrow_mut()
                    .push(TransportEvent::Message(txt.into()));
            }
        }) as Box<dyn Fn(MessageEvent)>);
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let events_close = self.events.clone();
        let on_close = Closure::wrap(Box::new(move |e: CloseEvent| {
            events_close.borrow_mut().push(TransportEvent::Closed {
                code: Some(e.code()),
                reason: e.reason(),
            });
        }) as Box<dyn Fn(CloseEvent)>);
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        let events_err = self.events.clone();
        let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
            events_err
                .borrow_mut()
                .push(TransportEvent::Error("WebSocket error".to_string()));
        }) as Box<dyn Fn(ErrorEvent)>);
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        self.ws = Some(ws);
        self._on_open = Some(on_open);
        self._on_message = Some(on_message);
        self._on_close = Some(on_close);
        self._on_error = Some(on_error);
        Ok(())
    }

    fn send(&mut self, text: &str) -> SyncResult<()> {
        match self.ws {
            Some(ref ws) => ws
                .send_with_str(text)
                .map_err(|e| SyncError::Transport(format!("Send failed: {:?}", e))),
            None => Err(SyncError::Transport("Not connected".to_string())),
        }
    }

    fn close(&mut self, code: u16, reason: &str) {
        if let Some(ref ws) = self.ws {
            if let Err(e) = ws.close_with_code_and_reason(code, reason) {
                log::warn!("WebSocket close failed: {:?}", e);
            }
        }
    }

    fn release(&mut self) {
        if let Some(ws) = self.ws.take() {
            // Detach handlers before their closures are dropped.
            ws.set_onopen(None);
            ws.set_onmessage(None);
            ws.set_onclose(None);
            ws.set_onerror(None);
            if ws.ready_state() == WebSocket::OPEN || ws.ready_state() == WebSocket::CONNECTING {
                let _ = ws.close();
            }
        }
        self._on_open = None;
        self._on_message = None;
        self._on_close = None;
        self._on_error = None;
        self.events.borrow_mut().clear();
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl Drop for WasmTransport {
    fn drop(&mut self) {
        self.release();
    }
}
