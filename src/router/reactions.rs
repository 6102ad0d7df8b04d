//! Default reactions to server pushes.
//!
//! Each reaction shows a notice and reloads the lists the event affects.
//! Lists a push invalidates are reloaded after the context's refresh delay
//! so the server has persisted the change first.

use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::{EventKind, InboundEvent};

use super::view::{Notice, RefreshTarget};
use super::{EventHandler, RouteContext};

/// Fallback text for an error event without message.
const GENERIC_ERROR: &str = "An error occurred";

/// Returns the built-in handler for `kind`, if it has one.
pub(crate) fn default_for(kind: EventKind) -> Option<EventHandler> {
    let handler: EventHandler = match kind {
        EventKind::NewRide => Box::new(new_ride),
        EventKind::RideCreated => Box::new(ride_created),
        EventKind::RideAssigned => Box::new(ride_assigned),
        EventKind::RideAssignedSuccess => Box::new(ride_assigned_success),
        EventKind::RideCompleted => Box::new(ride_completed),
        EventKind::Error => Box::new(server_error),
        EventKind::Connected | EventKind::Pong => return None,
    };
    Some(handler)
}

fn new_ride(event: &InboundEvent, ctx: &RouteContext<'_>) -> Result<()> {
    let InboundEvent::NewRide {
        ride_id: Some(ride_id),
        pickup: Some(pickup),
        dropoff: Some(dropoff),
        ..
    } = event
    else {
        debug!("Incomplete new ride notification ignored");
        return Ok(());
    };

    trace!(%ride_id, "New ride request");
    ctx.notify(Notice::success(format!(
        "New ride request: {pickup} → {dropoff}"
    )));
    ctx.refresh_later(RefreshTarget::RideRequests);
    Ok(())
}

fn ride_created(event: &InboundEvent, ctx: &RouteContext<'_>) -> Result<()> {
    let text = match event.ride_id() {
        Some(ride_id) => format!("Ride created successfully! Ride ID: {ride_id}"),
        None => "Ride created successfully!".to_string(),
    };
    ctx.notify(Notice::success(text));
    ctx.refresh_later(RefreshTarget::MyRides);
    Ok(())
}

fn ride_assigned(_event: &InboundEvent, ctx: &RouteContext<'_>) -> Result<()> {
    ctx.notify(Notice::success(
        "Your ride has been assigned! Driver is on the way.",
    ));
    ctx.refresh_later(RefreshTarget::MyRides);
    Ok(())
}

fn ride_assigned_success(event: &InboundEvent, ctx: &RouteContext<'_>) -> Result<()> {
    let text = match event.ride_id() {
        Some(ride_id) => format!("Ride {ride_id} assigned successfully!"),
        None => "Ride assigned successfully!".to_string(),
    };
    ctx.notify(Notice::success(text));
    ctx.refresh_now(RefreshTarget::RideRequests);
    ctx.refresh_later(RefreshTarget::AssignedRides);
    Ok(())
}

fn ride_completed(_event: &InboundEvent, ctx: &RouteContext<'_>) -> Result<()> {
    ctx.notify(Notice::success("Ride completed!"));
    ctx.refresh_later(RefreshTarget::MyRides);
    ctx.refresh_later(RefreshTarget::AssignedRides);
    Ok(())
}

fn server_error(event: &InboundEvent, ctx: &RouteContext<'_>) -> Result<()> {
    let message = match event {
        InboundEvent::Error {
            message: Some(message),
        } if !message.is_empty() => message.as_str(),
        _ => GENERIC_ERROR,
    };
    ctx.notify(Notice::error(message));
    Ok(())
}
