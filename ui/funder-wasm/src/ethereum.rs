//! `window.ethereum` as an [`Eip1193Transport`].

use async_trait::async_trait;
use fd_wallet::eip1193::decode_event;
use fd_wallet::{Eip1193Transport, EventHandler, Subscription, WalletError};
use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

const WALLET_EVENTS: [&str; 2] = ["accountsChanged", "chainChanged"];

#[wasm_bindgen]
extern "C" {
    /// Injected EIP-1193 provider.
    #[derive(Debug, Clone)]
    pub type Ethereum;

    #[wasm_bindgen(method, catch)]
    fn request(this: &Ethereum, args: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &Ethereum, event: &str, listener: &Function);

    #[wasm_bindgen(method, js_name = removeListener)]
    fn remove_listener(this: &Ethereum, event: &str, listener: &Function);
}

#[derive(Serialize)]
struct RequestArguments<'a> {
    method: &'a str,
    params: &'a Value,
}

pub struct BrowserTransport {
    ethereum: Option<Ethereum>,
}

impl BrowserTransport {
    /// Looks up `window.ethereum` once. A page without an extension gets an
    /// unavailable transport rather than an error.
    pub fn detect() -> Self {
        let ethereum = web_sys::window()
            .and_then(|window| Reflect::get(&window, &JsValue::from_str("ethereum")).ok())
            .filter(|value| !value.is_undefined() && !value.is_null())
            .map(|value| value.unchecked_into::<Ethereum>());
        if ethereum.is_none() {
            gloo_console::warn!("no injected wallet found on window.ethereum");
        }
        Self { ethereum }
    }
}

#[async_trait(?Send)]
impl Eip1193Transport for BrowserTransport {
    fn is_available(&self) -> bool {
        self.ethereum.is_some()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let ethereum = self.ethereum.as_ref().ok_or(WalletError::Unavailable)?;
        let args = RequestArguments {
            method,
            params: &params,
        }
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| WalletError::Transport(err.to_string()))?;

        let promise = ethereum.request(&args).map_err(wallet_error)?;
        let result = JsFuture::from(promise).await.map_err(wallet_error)?;
        if result.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result).map_err(|err| WalletError::Transport(err.to_string()))
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        let Some(ethereum) = self.ethereum.clone() else {
            return Subscription::detached();
        };

        let listeners: Vec<(&'static str, Closure<dyn Fn(JsValue)>)> = WALLET_EVENTS
            .into_iter()
            .map(|name| {
                let handler = handler.clone();
                let listener = Closure::<dyn Fn(JsValue)>::new(move |payload: JsValue| {
                    let payload: Value =
                        serde_wasm_bindgen::from_value(payload).unwrap_or(Value::Null);
                    match decode_event(name, &payload) {
                        Some(event) => handler(event),
                        None => gloo_console::warn!(format!("ignoring malformed {name} payload")),
                    }
                });
                ethereum.on(name, listener.as_ref().unchecked_ref());
                (name, listener)
            })
            .collect();

        Subscription::new(move || {
            for (name, listener) in &listeners {
                ethereum.remove_listener(name, listener.as_ref().unchecked_ref());
            }
        })
    }

    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

/// Provider errors are plain objects carrying `code` and `message`.
fn wallet_error(err: JsValue) -> WalletError {
    let code = Reflect::get(&err, &JsValue::from_str("code"))
        .ok()
        .and_then(|code| code.as_f64());
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{err:?}"));

    match code {
        Some(code) => WalletError::from_rpc(code as i64, message),
        None => WalletError::Transport(message),
    }
}
