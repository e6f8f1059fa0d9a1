//! View/session state for the ordering client and the actions that drive it.
//!
//! All state lives in one [`ViewSession`] behind an async mutex. The lock is
//! released before every remote call, so actions can overlap; fetch results
//! carry a sequence ticket and only the newest one is applied. Work that
//! outlives the session it started in is dropped when it resolves.

use std::sync::Arc;

use shared::{
    domain::{Order, Product, ProductId, UserProfile},
    protocol::{PlaceOrderRequest, RegisterRequest},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{api::OrderService, error::ActionError};

const LOGIN_FAILED: &str = "Login failed";
const SIGNUP_FAILED: &str = "Signup failed";
const SIGNUP_SUCCEEDED: &str = "Profile created! Please login.";
const ORDER_FAILED: &str = "Failed to place order";
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Login,
    Signup,
    Menu,
    History,
}

impl ViewState {
    pub fn requires_session(self) -> bool {
        matches!(self, Self::Menu | Self::History)
    }
}

/// Transient input buffers behind the login and signup forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftForm {
    pub email: String,
    pub name: String,
    pub passcode: String,
}

impl DraftForm {
    pub fn is_empty(&self) -> bool {
        self.email.is_empty() && self.name.is_empty() && self.passcode.is_empty()
    }

    fn clear(&mut self) {
        self.email.clear();
        self.name.clear();
        self.passcode.clear();
    }
}

/// Read-only copy of everything a front end renders.
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub session: Option<UserProfile>,
    pub view: ViewState,
    pub menu: Vec<Product>,
    pub orders: Vec<Order>,
    pub drafts: DraftForm,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ViewChanged(ViewState),
    SessionChanged(Option<UserProfile>),
    MenuReplaced { items: usize },
    OrdersReplaced { orders: usize },
    Notice(String),
    Error(String),
}

#[derive(Debug, Default)]
struct FetchSequence {
    issued: u64,
    applied: u64,
}

impl FetchSequence {
    fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, ticket: u64) -> bool {
        if ticket <= self.applied {
            return false;
        }
        self.applied = ticket;
        true
    }

    /// Rejects every ticket issued so far.
    fn invalidate(&mut self) {
        self.issued += 1;
        self.applied = self.issued;
    }
}

#[derive(Debug, Default)]
struct ViewSession {
    session: Option<UserProfile>,
    view: ViewState,
    menu: Vec<Product>,
    orders: Vec<Order>,
    drafts: DraftForm,
    error: Option<String>,
    menu_fetches: FetchSequence,
    order_fetches: FetchSequence,
    /// Bumped on every sign-in and sign-out.
    session_epoch: u64,
}

impl ViewSession {
    fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            session: self.session.clone(),
            view: self.view,
            menu: self.menu.clone(),
            orders: self.orders.clone(),
            drafts: self.drafts.clone(),
            error: self.error.clone(),
        }
    }

    fn signed_in_as(&self, email: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|profile| profile.email == email)
    }

    fn check_transition(&self, target: ViewState) -> Result<(), ActionError> {
        match (target.requires_session(), self.session.is_some()) {
            (true, false) => Err(ActionError::SessionRequired { target }),
            (false, true) => Err(ActionError::SignedOutOnly { target }),
            _ => Ok(()),
        }
    }
}

pub struct ViewController {
    service: Arc<dyn OrderService>,
    inner: Mutex<ViewSession>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ViewController {
    pub fn new(service: Arc<dyn OrderService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            service,
            inner: Mutex::new(ViewSession::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.inner.lock().await.snapshot()
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    /// Replaces the menu on success; failures are logged and the previous
    /// menu stays in place.
    pub async fn load_menu(&self) {
        let ticket = self.inner.lock().await.menu_fetches.begin();

        match self.service.fetch_menu().await {
            Ok(items) => {
                let count = items.len();
                let applied = {
                    let mut guard = self.inner.lock().await;
                    let accepted = guard.menu_fetches.accept(ticket);
                    if accepted {
                        guard.menu = items;
                    }
                    accepted
                };
                if applied {
                    debug!(items = count, "menu replaced");
                    self.emit(ControllerEvent::MenuReplaced { items: count });
                } else {
                    debug!(ticket, "discarding stale menu response");
                }
            }
            Err(err) => warn!(error = %err, "failed to fetch menu"),
        }
    }

    /// Replaces the order history on success; failures are logged only.
    /// Skipped unless `email` belongs to the signed-in user.
    pub async fn load_orders(&self, email: &str) {
        let ticket = {
            let mut guard = self.inner.lock().await;
            if !guard.signed_in_as(email) {
                debug!(email, "order history fetch skipped for inactive session");
                return;
            }
            guard.order_fetches.begin()
        };

        match self.service.fetch_orders(email).await {
            Ok(orders) => {
                let count = orders.len();
                let applied = {
                    let mut guard = self.inner.lock().await;
                    let accepted =
                        guard.signed_in_as(email) && guard.order_fetches.accept(ticket);
                    if accepted {
                        guard.orders = orders;
                    }
                    accepted
                };
                if applied {
                    debug!(email, orders = count, "order history replaced");
                    self.emit(ControllerEvent::OrdersReplaced { orders: count });
                } else {
                    debug!(email, ticket, "discarding stale order history response");
                }
            }
            Err(err) => warn!(email, error = %err, "failed to fetch orders"),
        }
    }

    pub async fn login(&self, email: &str, passcode: &str) {
        self.inner.lock().await.error = None;

        match self.service.login(email, passcode).await {
            Ok(profile) => {
                info!(email = %profile.email, "signed in");
                let email = profile.email.clone();
                {
                    let mut guard = self.inner.lock().await;
                    guard.session = Some(profile.clone());
                    guard.view = ViewState::Menu;
                    guard.order_fetches.invalidate();
                    guard.session_epoch += 1;
                }
                self.emit(ControllerEvent::SessionChanged(Some(profile)));
                self.emit(ControllerEvent::ViewChanged(ViewState::Menu));
                self.load_orders(&email).await;
            }
            Err(err) => {
                warn!(email, error = %err, "login failed");
                let message = err.detail().unwrap_or(LOGIN_FAILED).to_string();
                self.inner.lock().await.error = Some(message.clone());
                self.emit(ControllerEvent::Error(message));
            }
        }
    }

    /// Ignored while signed in; the signup form is only reachable signed out.
    pub async fn signup(&self, email: &str, name: &str, passcode: &str) {
        {
            let mut guard = self.inner.lock().await;
            if guard.session.is_some() {
                debug!("signup ignored while signed in");
                return;
            }
            guard.error = None;
        }

        let request = RegisterRequest {
            email: email.to_string(),
            name: name.to_string(),
            passcode: passcode.to_string(),
        };
        match self.service.register(&request).await {
            Ok(()) => {
                info!(email, "profile created");
                self.emit(ControllerEvent::Notice(SIGNUP_SUCCEEDED.to_string()));
                let switched = {
                    let mut guard = self.inner.lock().await;
                    let switched = guard.session.is_none();
                    if switched {
                        guard.view = ViewState::Login;
                    }
                    switched
                };
                if switched {
                    self.emit(ControllerEvent::ViewChanged(ViewState::Login));
                }
            }
            Err(err) => {
                warn!(email, error = %err, "signup failed");
                let message = err.detail().unwrap_or(SIGNUP_FAILED).to_string();
                self.inner.lock().await.error = Some(message.clone());
                self.emit(ControllerEvent::Error(message));
            }
        }
    }

    /// Orders one unit of `product`. Does nothing without a session.
    pub async fn place_order(&self, product: &Product) {
        let started = {
            let guard = self.inner.lock().await;
            guard
                .session
                .as_ref()
                .map(|profile| (profile.email.clone(), guard.session_epoch))
        };
        let Some((email, epoch)) = started else {
            debug!(product = %product.id, "place_order ignored without session");
            return;
        };

        let request = PlaceOrderRequest::single(email.clone(), product);
        let outcome = self.service.place_order(&request).await;
        match &outcome {
            Ok(()) => info!(email = %email, product = %product.id, "order placed"),
            Err(err) => {
                warn!(email = %email, product = %product.id, error = %err, "order failed")
            }
        }

        if self.inner.lock().await.session_epoch != epoch {
            debug!(email = %email, product = %product.id, "session changed while ordering");
            return;
        }
        match outcome {
            Ok(()) => {
                self.emit(ControllerEvent::Notice(format!("Ordered {}!", product.name)));
                self.load_orders(&email).await;
            }
            Err(_) => self.emit(ControllerEvent::Notice(ORDER_FAILED.to_string())),
        }
    }

    /// Looks `product_id` up on the current menu and orders it.
    pub async fn place_order_by_id(&self, product_id: &ProductId) -> Result<(), ActionError> {
        let product = {
            let guard = self.inner.lock().await;
            guard
                .menu
                .iter()
                .find(|product| &product.id == product_id)
                .cloned()
        };
        let product = product.ok_or_else(|| ActionError::UnknownProduct(product_id.clone()))?;
        self.place_order(&product).await;
        Ok(())
    }

    pub async fn logout(&self) {
        {
            let mut guard = self.inner.lock().await;
            if let Some(profile) = guard.session.take() {
                info!(email = %profile.email, "signed out");
            }
            guard.view = ViewState::Login;
            guard.drafts.clear();
            guard.orders.clear();
            guard.order_fetches.invalidate();
            guard.session_epoch += 1;
        }
        self.emit(ControllerEvent::SessionChanged(None));
        self.emit(ControllerEvent::ViewChanged(ViewState::Login));
    }

    async fn navigate(&self, target: ViewState) -> Result<(), ActionError> {
        {
            let mut guard = self.inner.lock().await;
            guard.check_transition(target)?;
            if guard.view == target {
                return Ok(());
            }
            guard.view = target;
        }
        self.emit(ControllerEvent::ViewChanged(target));
        Ok(())
    }

    /// Login ⇄ Signup. Returns the view now active.
    pub async fn toggle_auth_view(&self) -> Result<ViewState, ActionError> {
        let target = match self.inner.lock().await.view {
            ViewState::Login => ViewState::Signup,
            ViewState::Signup => ViewState::Login,
            ViewState::Menu | ViewState::History => {
                return Err(ActionError::SignedOutOnly {
                    target: ViewState::Signup,
                })
            }
        };
        self.navigate(target).await?;
        Ok(target)
    }

    pub async fn show_menu(&self) -> Result<(), ActionError> {
        self.navigate(ViewState::Menu).await
    }

    pub async fn show_history(&self) -> Result<(), ActionError> {
        self.navigate(ViewState::History).await
    }

    /// Menu when signed in, Login otherwise.
    pub async fn go_home(&self) -> ViewState {
        let target = if self.inner.lock().await.session.is_some() {
            ViewState::Menu
        } else {
            ViewState::Login
        };
        if let Err(err) = self.navigate(target).await {
            // Session changed between the check and the switch.
            debug!(error = %err, "home navigation raced a session change");
        }
        self.inner.lock().await.view
    }

    pub async fn set_draft_email(&self, value: impl Into<String>) {
        self.inner.lock().await.drafts.email = value.into();
    }

    pub async fn set_draft_name(&self, value: impl Into<String>) {
        self.inner.lock().await.drafts.name = value.into();
    }

    pub async fn set_draft_passcode(&self, value: impl Into<String>) {
        self.inner.lock().await.drafts.passcode = value.into();
    }

    /// `login` with the drafted email and passcode.
    pub async fn submit_login(&self) {
        let drafts = self.inner.lock().await.drafts.clone();
        self.login(&drafts.email, &drafts.passcode).await;
    }

    /// `signup` with the drafted email, name and passcode.
    pub async fn submit_signup(&self) {
        let drafts = self.inner.lock().await.drafts.clone();
        self.signup(&drafts.email, &drafts.name, &drafts.passcode)
            .await;
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
