//! End-to-end emergency flow: trigger, countdown, location fix, sequential
//! alert dispatch, resolution. The tester plays the shell, resolving each
//! capability request by hand.

use crux_core::testing::AppTester;

use beacon_core::capabilities::{
    ContactStoreOutput, DeliveryError, DeliveryReceipt, LocationOutput, TimerOutput,
};
use beacon_core::model::{AlertStatus, Contact, ContactId, SessionStatus, ToastKind, UnixTimeMs};
use beacon_core::{App, Effect, Event, Model, ViewState};

fn contact(i: usize) -> Contact {
    Contact {
        id: ContactId::new(format!("c{i}")),
        name: format!("Contact {i}"),
        phone: format!("41555501{i:02}"),
        relationship: None,
        is_primary: i == 0,
    }
}

fn seed_contacts(app: &AppTester<App, Effect>, model: &mut Model, n: usize) {
    let contacts = (0..n).map(contact).collect();
    app.update(
        Event::ContactStoreResponded(Box::new(Ok(ContactStoreOutput::Listed(contacts)))),
        model,
    );
    assert_eq!(model.contacts.len(), n);
}

/// Drives the countdown from trigger to completion and returns the pending
/// location request.
fn run_countdown(
    app: &AppTester<App, Effect>,
    model: &mut Model,
) -> crux_core::Request<beacon_core::capabilities::LocationOperation> {
    let update = app.update(Event::EmergencyTriggered, model);
    assert!(model.active_error.is_none(), "trigger rejected: {:?}", model.active_error);
    assert_eq!(app.view(model).state, ViewState::CountingDown { remaining_seconds: 3 });

    let mut timer = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Timer(request) => Some(request),
            _ => None,
        })
        .expect("countdown schedules a timer");

    for second in 1..=3_u64 {
        let update = app
            .resolve(&mut timer, TimerOutput::Elapsed { now_ms: second * 1000 })
            .expect("timer resolves");
        let event = update.events.into_iter().next().expect("tick event");
        let update = app.update(event, model);

        if second < 3 {
            timer = update
                .effects
                .into_iter()
                .find_map(|e| match e {
                    Effect::Timer(request) => Some(request),
                    _ => None,
                })
                .expect("countdown reschedules while running");
        } else {
            return update
                .effects
                .into_iter()
                .find_map(|e| match e {
                    Effect::Location(request) => Some(request),
                    _ => None,
                })
                .expect("completed countdown requests a location fix");
        }
    }
    unreachable!()
}

fn fix() -> LocationOutput {
    LocationOutput::Fix {
        latitude: 37.7749,
        longitude: -122.4194,
        accuracy_m: Some(11.6),
        timestamp_ms: 3000,
    }
}

#[test]
fn full_flow_from_trigger_to_resolution() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.dispatch_config.inter_send_delay_ms = 0;
    seed_contacts(&app, &mut model, 2);

    let mut location = run_countdown(&app, &mut model);

    let update = app.resolve(&mut location, Ok(fix())).expect("location resolves");
    let event = update.events.into_iter().next().expect("location event");
    let update = app.update(event, &mut model);

    // Session exists, both alerts planned in contact order, first send out.
    let session = model.sessions.active().expect("session created");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.alerts_sent.len(), 2);
    assert_eq!(session.alerts_sent[0].contact_id, ContactId::new("c0"));
    assert_eq!(session.alerts_sent[1].contact_id, ContactId::new("c1"));
    assert!(session.alerts_sent[0].message.contains("maps.google.com"));
    assert_eq!(app.view(&model).state, ViewState::Dispatching { sent: 0, failed: 0, total: 2 });

    assert!(
        update.effects.iter().any(|e| matches!(e, Effect::History(_))),
        "new session is persisted"
    );
    let mut delivery = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Delivery(request) => Some(request),
            _ => None,
        })
        .expect("first alert dispatched");

    // First contact reached.
    let update = app
        .resolve(
            &mut delivery,
            Ok(DeliveryReceipt { accepted_at_ms: 4000, delivered_at_ms: Some(4001) }),
        )
        .expect("delivery resolves");
    let event = update.events.into_iter().next().expect("delivery event");
    let update = app.update(event, &mut model);

    // Zero pacing: the second send goes out in the same update.
    let mut delivery = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Delivery(request) => Some(request),
            _ => None,
        })
        .expect("second alert dispatched without a pause");

    // Second contact unreachable; the failure stays on its own alert.
    let update = app
        .resolve(&mut delivery, Err(DeliveryError::send_failed("carrier rejected")))
        .expect("delivery resolves");
    let event = update.events.into_iter().next().expect("delivery event");
    let update = app.update(event, &mut model);

    let session = model.sessions.active().expect("session still present");
    assert_eq!(session.alerts_sent[0].status, AlertStatus::Delivered);
    assert_eq!(session.alerts_sent[0].delivered_at, Some(UnixTimeMs(4001)));
    assert_eq!(session.alerts_sent[1].status, AlertStatus::Failed);
    assert!(!model.dispatch.in_flight());

    // Batch summary reflects the partial failure.
    assert!(
        update.effects.iter().any(|e| matches!(e, Effect::History(_))),
        "finished session is persisted"
    );
    let toast = model.active_toast.as_ref().expect("summary toast");
    assert_eq!(toast.kind, ToastKind::Warning);
    assert!(toast.message.contains("1 of 2"));

    // Resolve by id and the app returns to idle.
    let session_id = session.id.clone();
    app.update(
        Event::SessionResolveRequested {
            session_id,
            notes: Some("false alarm".into()),
            at: UnixTimeMs(9000),
        },
        &mut model,
    );
    assert!(!model.sessions.is_active());
    assert_eq!(model.sessions.history().len(), 1);
    assert_eq!(model.sessions.history()[0].status, SessionStatus::Resolved);
    assert_eq!(app.view(&model).state, ViewState::Idle { can_trigger: true });
}

#[test]
fn default_pacing_pauses_between_sends() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    seed_contacts(&app, &mut model, 2);

    let mut location = run_countdown(&app, &mut model);
    let update = app.resolve(&mut location, Ok(fix())).expect("location resolves");
    let event = update.events.into_iter().next().expect("location event");
    let update = app.update(event, &mut model);

    let mut delivery = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Delivery(request) => Some(request),
            _ => None,
        })
        .expect("first alert dispatched");

    let update = app
        .resolve(
            &mut delivery,
            Ok(DeliveryReceipt { accepted_at_ms: 4000, delivered_at_ms: None }),
        )
        .expect("delivery resolves");
    let event = update.events.into_iter().next().expect("delivery event");
    let update = app.update(event, &mut model);

    // With 500 ms pacing the next send waits behind a timer.
    assert!(
        !update.effects.iter().any(|e| matches!(e, Effect::Delivery(_))),
        "second send must wait for the pacing delay"
    );
    let mut pause = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Timer(request) => Some(request),
            _ => None,
        })
        .expect("pacing timer scheduled");

    let update = app
        .resolve(&mut pause, TimerOutput::Elapsed { now_ms: 4500 })
        .expect("pause resolves");
    let event = update.events.into_iter().next().expect("pause event");
    let update = app.update(event, &mut model);

    assert!(
        update.effects.iter().any(|e| matches!(e, Effect::Delivery(_))),
        "second send goes out after the pause"
    );
}

#[test]
fn duplicate_delivery_receipt_does_not_skip_a_contact() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.dispatch_config.inter_send_delay_ms = 0;
    seed_contacts(&app, &mut model, 2);

    let mut location = run_countdown(&app, &mut model);
    let update = app.resolve(&mut location, Ok(fix())).expect("location resolves");
    let event = update.events.into_iter().next().expect("location event");
    app.update(event, &mut model);

    let first_alert = model.sessions.active().unwrap().alerts_sent[0].id.clone();
    let second_alert = model.sessions.active().unwrap().alerts_sent[1].id.clone();
    let receipt = DeliveryReceipt { accepted_at_ms: 4000, delivered_at_ms: Some(4000) };

    app.update(
        Event::AlertDeliveryCompleted { alert_id: first_alert.clone(), result: Box::new(Ok(receipt)) },
        &mut model,
    );
    assert_eq!(model.dispatch.current(), Some(&second_alert));

    // A duplicate receipt for the first alert must not advance the cursor.
    let update = app.update(
        Event::AlertDeliveryCompleted { alert_id: first_alert, result: Box::new(Ok(receipt)) },
        &mut model,
    );
    assert_eq!(model.dispatch.current(), Some(&second_alert));
    assert!(
        !update.effects.iter().any(|e| matches!(e, Effect::Delivery(_))),
        "duplicate receipt must not trigger a send"
    );
}

#[test]
fn location_failure_degrades_to_dispatch_without_fix() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.dispatch_config.inter_send_delay_ms = 0;
    seed_contacts(&app, &mut model, 1);

    let mut location = run_countdown(&app, &mut model);
    let update = app
        .resolve(
            &mut location,
            Err(beacon_core::capabilities::LocationError::PermissionDenied),
        )
        .expect("location resolves");
    let event = update.events.into_iter().next().expect("location event");
    let update = app.update(event, &mut model);

    // The emergency proceeds; the message says the location is unknown.
    let session = model.sessions.active().expect("session created without a fix");
    assert!(session.location.is_none());
    assert!(session.alerts_sent[0]
        .message
        .contains("Location: Unable to determine current location"));
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Delivery(_))));

    let toast = model.active_toast.as_ref().expect("degraded-fix toast");
    assert_eq!(toast.message, "Location access denied. Please enable location services.");
}

#[test]
fn trigger_rejected_while_an_emergency_is_active() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.dispatch_config.inter_send_delay_ms = 0;
    seed_contacts(&app, &mut model, 1);

    let mut location = run_countdown(&app, &mut model);
    let update = app.resolve(&mut location, Ok(fix())).expect("location resolves");
    let event = update.events.into_iter().next().expect("location event");
    app.update(event, &mut model);
    assert!(model.sessions.is_active());

    let update = app.update(Event::EmergencyTriggered, &mut model);
    let error = model.active_error.as_ref().expect("overlap rejected");
    assert_eq!(error.kind, beacon_core::ErrorKind::InvalidState);
    assert!(
        !update.effects.iter().any(|e| matches!(e, Effect::Timer(_))),
        "no second countdown may start"
    );
}

#[test]
fn trigger_rejected_without_contacts() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::EmergencyTriggered, &mut model);
    let error = model.active_error.as_ref().expect("empty contact set rejected");
    assert_eq!(error.kind, beacon_core::ErrorKind::Validation);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Timer(_))));
    assert_eq!(app.view(&model).state, ViewState::Idle { can_trigger: false });
}
