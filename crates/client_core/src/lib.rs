pub mod api;
pub mod controller;
pub mod error;

pub use api::{HttpOrderService, OrderService};
pub use controller::{ControllerEvent, DraftForm, ViewController, ViewSnapshot, ViewState};
pub use error::{ActionError, OrderServiceError};
