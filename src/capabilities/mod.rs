mod contacts;
mod delivery;
mod history;
mod location;
mod timer;

pub use self::contacts::{
    ContactStore, ContactStoreError, ContactStoreOperation, ContactStoreOutput, ContactStoreResult,
};
pub use self::delivery::{
    DeliveryChannel, DeliveryError, DeliveryOperation, DeliveryReceipt, DeliveryResult,
};
pub use self::history::{
    SessionStore, SessionStoreError, SessionStoreOperation, SessionStoreOutput, SessionStoreResult,
};
pub use self::location::{
    LocationError, LocationOperation, LocationOptions, LocationOutput, LocationProvider,
    LocationResult,
};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// We use Crux's built-in Render capability directly because it provides
// all necessary functionality for triggering view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

pub type AppRender = Render<Event>;
pub type AppTimer = Timer<Event>;
pub type AppLocation = LocationProvider<Event>;
pub type AppContacts = ContactStore<Event>;
pub type AppDelivery = DeliveryChannel<Event>;
pub type AppHistory = SessionStore<Event>;

// The Effect derive names each variant after the identifier of the field's
// type, so these generic aliases pick the variant names (Effect::Location,
// Effect::Delivery, ...) without renaming the capability types.
type Location<Ev> = LocationProvider<Ev>;
type Contacts<Ev> = ContactStore<Ev>;
type Delivery<Ev> = DeliveryChannel<Ev>;
type History<Ev> = SessionStore<Ev>;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub timer: Timer<Event>,
    pub location: Location<Event>,
    pub contacts: Contacts<Event>,
    pub delivery: Delivery<Event>,
    pub history: History<Event>,
}
