//! JavaScript handle over the campaign board.
//!
//! Every method resolves with the board snapshot; failures are already
//! folded into the snapshot's alert. After each change a `funder:update`
//! event carrying the same snapshot is dispatched on `window`, including
//! the intermediate ones (busy, transaction pending) of a running action.

use fd_contract::RpcBinder;
use fd_session::{AppConfig, Board, Session, SessionError};
use fd_wallet::Eip1193Wallet;
use js_sys::Promise;
use serde::Serialize;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{CustomEvent, CustomEventInit};

use crate::ethereum::BrowserTransport;

pub const UPDATE_EVENT: &str = "funder:update";

type BrowserBoard = Board<Eip1193Wallet<BrowserTransport>, RpcBinder<BrowserTransport>>;

#[wasm_bindgen]
pub struct FunderApp {
    board: Rc<BrowserBoard>,
}

impl Default for FunderApp {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl FunderApp {
    #[wasm_bindgen(constructor)]
    pub fn new() -> FunderApp {
        let config = AppConfig::from_build_env();
        let transport = Rc::new(BrowserTransport::detect());
        let wallet = Rc::new(Eip1193Wallet::new(transport.clone()));
        let binder = RpcBinder::new(transport, config.confirmation_poll);
        let board = Rc::new(Board::new(Session::new(wallet, binder, &config)));

        let weak = Rc::downgrade(&board);
        board.subscribe(move |reaction| {
            let weak = weak.clone();
            spawn_local(async move {
                if let Some(board) = weak.upgrade() {
                    board.react(reaction).await;
                    publish(&board);
                }
            });
        });

        let weak = Rc::downgrade(&board);
        board.on_change(move || {
            if let Some(board) = weak.upgrade() {
                publish(&board);
            }
        });

        FunderApp { board }
    }

    pub fn connect(&self) -> Promise {
        self.run(move |board| async move { report("connect", board.connect().await) })
    }

    pub fn refresh(&self) -> Promise {
        self.run(move |board| async move { report("refresh", board.refresh().await) })
    }

    #[wasm_bindgen(js_name = createCampaign)]
    pub fn create_campaign(&self, title: String, description: String, goal: String) -> Promise {
        self.run(move |board| async move {
            report("createCampaign", board.create(&title, &description, &goal).await)
        })
    }

    /// `amount` is in ether, as typed.
    #[wasm_bindgen(js_name = fundCampaign)]
    pub fn fund_campaign(&self, id: u32, amount: String) -> Promise {
        self.run(move |board| async move {
            report("fundCampaign", board.fund(u64::from(id), &amount).await)
        })
    }

    #[wasm_bindgen(js_name = withdrawFunds)]
    pub fn withdraw_funds(&self, id: u32) -> Promise {
        self.run(move |board| async move {
            report("withdrawFunds", board.withdraw(u64::from(id)).await)
        })
    }

    #[wasm_bindgen(js_name = dismissAlert)]
    pub fn dismiss_alert(&self) -> Result<JsValue, JsValue> {
        self.board.dismiss_alert();
        publish(&self.board);
        snapshot(&self.board)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        snapshot(&self.board)
    }

    /// Cards for the campaigns the connected account created.
    #[wasm_bindgen(js_name = ownCampaigns)]
    pub fn own_campaigns(&self) -> Result<JsValue, JsValue> {
        to_js(&self.board.own_views())
    }
}

impl FunderApp {
    fn run<F, Fut>(&self, action: F) -> Promise
    where
        F: FnOnce(Rc<BrowserBoard>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let board = self.board.clone();
        future_to_promise(async move {
            action(board.clone()).await;
            publish(&board);
            snapshot(&board)
        })
    }
}

fn report<T>(action: &str, result: Result<T, SessionError>) {
    if let Err(err) = result {
        gloo_console::warn!(format!("{action} failed: {err}"));
    }
}

fn snapshot(board: &BrowserBoard) -> Result<JsValue, JsValue> {
    to_js(&board.snapshot())
}

fn to_js(value: &impl Serialize) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

fn publish(board: &BrowserBoard) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let detail = match snapshot(board) {
        Ok(detail) => detail,
        Err(err) => {
            gloo_console::error!(err);
            return;
        }
    };

    let init = CustomEventInit::new();
    init.set_detail(&detail);
    match CustomEvent::new_with_event_init_dict(UPDATE_EVENT, &init) {
        Ok(event) => {
            if let Err(err) = window.dispatch_event(&event) {
                gloo_console::error!(err);
            }
        }
        Err(err) => gloo_console::error!(err),
    }
}
