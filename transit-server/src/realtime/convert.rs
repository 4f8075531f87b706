//! Conversion between GTFS-realtime wire types and live feed domain types.

use gtfs_realtime as rt;
use gtfs_realtime::trip_descriptor::ScheduleRelationship as TripScheduleRelationship;
use gtfs_realtime::trip_update::stop_time_update::ScheduleRelationship as StopScheduleRelationship;
use prost::Message;

use super::error::FeedError;
use super::types::{
    Alert, FeedEntity, InformedEntity, LiveMessage, Position, StopRelationship, StopTimeEvent,
    StopTimeUpdate, TripDescriptor, TripRelationship, TripUpdate, VehicleDescriptor,
    VehiclePosition,
};

const GTFS_REALTIME_VERSION: &str = "2.0";

/// Decode a protobuf-encoded feed message.
pub fn decode_message(bytes: &[u8]) -> Result<LiveMessage, FeedError> {
    let wire = rt::FeedMessage::decode(bytes).map_err(|e| FeedError::Decode {
        message: e.to_string(),
    })?;
    Ok(LiveMessage::from(wire))
}

/// Encode a feed message to protobuf bytes.
pub fn encode_message(message: &LiveMessage) -> Vec<u8> {
    rt::FeedMessage::from(message).encode_to_vec()
}

impl From<rt::FeedMessage> for LiveMessage {
    fn from(wire: rt::FeedMessage) -> Self {
        Self {
            timestamp: wire.header.timestamp.unwrap_or(0),
            entities: wire
                .entity
                .into_iter()
                .filter(|e| !e.is_deleted.unwrap_or(false))
                .map(FeedEntity::from)
                .collect(),
        }
    }
}

impl From<rt::FeedEntity> for FeedEntity {
    fn from(wire: rt::FeedEntity) -> Self {
        Self {
            id: wire.id,
            trip_update: wire.trip_update.map(TripUpdate::from),
            vehicle: wire.vehicle.map(VehiclePosition::from),
            alert: wire.alert.map(Alert::from),
        }
    }
}

impl From<rt::TripDescriptor> for TripDescriptor {
    fn from(wire: rt::TripDescriptor) -> Self {
        // Newer relationships (duplicated, replacement, ...) run to the static schedule.
        let schedule_relationship = match wire.schedule_relationship() {
            TripScheduleRelationship::Added => TripRelationship::Added,
            TripScheduleRelationship::Unscheduled => TripRelationship::Unscheduled,
            TripScheduleRelationship::Canceled => TripRelationship::Canceled,
            _ => TripRelationship::Scheduled,
        };
        Self {
            trip_id: wire.trip_id,
            route_id: wire.route_id,
            direction_id: wire.direction_id,
            start_time: wire.start_time,
            start_date: wire.start_date,
            schedule_relationship,
        }
    }
}

impl From<rt::VehicleDescriptor> for VehicleDescriptor {
    fn from(wire: rt::VehicleDescriptor) -> Self {
        Self {
            id: wire.id,
            label: wire.label,
            license_plate: wire.license_plate,
        }
    }
}

impl From<rt::TripUpdate> for TripUpdate {
    fn from(wire: rt::TripUpdate) -> Self {
        Self {
            trip: wire.trip.into(),
            vehicle: wire.vehicle.map(VehicleDescriptor::from),
            stop_time_updates: wire
                .stop_time_update
                .into_iter()
                .map(StopTimeUpdate::from)
                .collect(),
            timestamp: wire.timestamp,
            delay: wire.delay,
        }
    }
}

impl From<rt::trip_update::StopTimeEvent> for StopTimeEvent {
    fn from(wire: rt::trip_update::StopTimeEvent) -> Self {
        Self {
            delay: wire.delay,
            time: wire.time,
            uncertainty: wire.uncertainty,
        }
    }
}

impl From<rt::trip_update::StopTimeUpdate> for StopTimeUpdate {
    fn from(wire: rt::trip_update::StopTimeUpdate) -> Self {
        let schedule_relationship = match wire.schedule_relationship() {
            StopScheduleRelationship::Skipped => StopRelationship::Skipped,
            StopScheduleRelationship::NoData => StopRelationship::NoData,
            StopScheduleRelationship::Unscheduled => StopRelationship::Unscheduled,
            _ => StopRelationship::Scheduled,
        };
        Self {
            stop_sequence: wire.stop_sequence,
            stop_id: wire.stop_id,
            arrival: wire.arrival.map(StopTimeEvent::from),
            departure: wire.departure.map(StopTimeEvent::from),
            schedule_relationship,
        }
    }
}

impl From<rt::VehiclePosition> for VehiclePosition {
    fn from(wire: rt::VehiclePosition) -> Self {
        Self {
            trip: wire.trip.map(TripDescriptor::from),
            vehicle: wire.vehicle.map(VehicleDescriptor::from),
            position: wire.position.map(|p| Position {
                latitude: p.latitude,
                longitude: p.longitude,
                bearing: p.bearing,
                speed: p.speed,
            }),
            current_stop_sequence: wire.current_stop_sequence,
            stop_id: wire.stop_id,
            timestamp: wire.timestamp,
        }
    }
}

/// Pick the English translation if there is one, otherwise the first.
fn translated_text(wire: rt::TranslatedString) -> Option<String> {
    let english = wire
        .translation
        .iter()
        .position(|t| t.language.as_deref().is_some_and(|l| l.starts_with("en")));
    let index = english.unwrap_or(0);
    wire.translation.into_iter().nth(index).map(|t| t.text)
}

impl From<rt::Alert> for Alert {
    fn from(wire: rt::Alert) -> Self {
        Self {
            header_text: wire.header_text.and_then(translated_text),
            description_text: wire.description_text.and_then(translated_text),
            url: wire.url.and_then(translated_text),
            informed_entities: wire
                .informed_entity
                .into_iter()
                .map(|s| InformedEntity {
                    agency_id: s.agency_id,
                    route_id: s.route_id,
                    trip_id: s.trip.and_then(|t| t.trip_id),
                    stop_id: s.stop_id,
                })
                .collect(),
        }
    }
}

impl From<&LiveMessage> for rt::FeedMessage {
    fn from(message: &LiveMessage) -> Self {
        Self {
            header: rt::FeedHeader {
                gtfs_realtime_version: GTFS_REALTIME_VERSION.to_string(),
                incrementality: Some(rt::feed_header::Incrementality::FullDataset as i32),
                timestamp: (message.timestamp != 0).then_some(message.timestamp),
                ..Default::default()
            },
            entity: message.entities.iter().map(rt::FeedEntity::from).collect(),
        }
    }
}

impl From<&FeedEntity> for rt::FeedEntity {
    fn from(entity: &FeedEntity) -> Self {
        Self {
            id: entity.id.clone(),
            is_deleted: None,
            trip_update: entity.trip_update.as_ref().map(rt::TripUpdate::from),
            vehicle: entity.vehicle.as_ref().map(rt::VehiclePosition::from),
            alert: entity.alert.as_ref().map(rt::Alert::from),
            ..Default::default()
        }
    }
}

impl From<&TripDescriptor> for rt::TripDescriptor {
    fn from(trip: &TripDescriptor) -> Self {
        let relationship = match trip.schedule_relationship {
            TripRelationship::Scheduled => None,
            TripRelationship::Added => Some(TripScheduleRelationship::Added),
            TripRelationship::Unscheduled => Some(TripScheduleRelationship::Unscheduled),
            TripRelationship::Canceled => Some(TripScheduleRelationship::Canceled),
        };
        Self {
            trip_id: trip.trip_id.clone(),
            start_time: trip.start_time.clone(),
            start_date: trip.start_date.clone(),
            schedule_relationship: relationship.map(|r| r as i32),
            route_id: trip.route_id.clone(),
            direction_id: trip.direction_id,
            ..Default::default()
        }
    }
}

impl From<&VehicleDescriptor> for rt::VehicleDescriptor {
    fn from(vehicle: &VehicleDescriptor) -> Self {
        Self {
            id: vehicle.id.clone(),
            label: vehicle.label.clone(),
            license_plate: vehicle.license_plate.clone(),
            ..Default::default()
        }
    }
}

impl From<&TripUpdate> for rt::TripUpdate {
    fn from(update: &TripUpdate) -> Self {
        Self {
            trip: (&update.trip).into(),
            stop_time_update: update
                .stop_time_updates
                .iter()
                .map(rt::trip_update::StopTimeUpdate::from)
                .collect(),
            vehicle: update.vehicle.as_ref().map(rt::VehicleDescriptor::from),
            timestamp: update.timestamp,
            delay: update.delay,
            ..Default::default()
        }
    }
}

impl From<&StopTimeEvent> for rt::trip_update::StopTimeEvent {
    fn from(event: &StopTimeEvent) -> Self {
        Self {
            delay: event.delay,
            time: event.time,
            uncertainty: event.uncertainty,
            ..Default::default()
        }
    }
}

impl From<&StopTimeUpdate> for rt::trip_update::StopTimeUpdate {
    fn from(update: &StopTimeUpdate) -> Self {
        let relationship = match update.schedule_relationship {
            StopRelationship::Scheduled => None,
            StopRelationship::Skipped => Some(StopScheduleRelationship::Skipped),
            StopRelationship::NoData => Some(StopScheduleRelationship::NoData),
            StopRelationship::Unscheduled => Some(StopScheduleRelationship::Unscheduled),
        };
        Self {
            stop_sequence: update.stop_sequence,
            arrival: update.arrival.as_ref().map(rt::trip_update::StopTimeEvent::from),
            departure: update.departure.as_ref().map(rt::trip_update::StopTimeEvent::from),
            stop_id: update.stop_id.clone(),
            schedule_relationship: relationship.map(|r| r as i32),
            ..Default::default()
        }
    }
}

impl From<&VehiclePosition> for rt::VehiclePosition {
    fn from(position: &VehiclePosition) -> Self {
        Self {
            trip: position.trip.as_ref().map(rt::TripDescriptor::from),
            position: position.position.map(|p| rt::Position {
                latitude: p.latitude,
                longitude: p.longitude,
                bearing: p.bearing,
                speed: p.speed,
                ..Default::default()
            }),
            current_stop_sequence: position.current_stop_sequence,
            timestamp: position.timestamp,
            stop_id: position.stop_id.clone(),
            vehicle: position.vehicle.as_ref().map(rt::VehicleDescriptor::from),
            ..Default::default()
        }
    }
}

fn translated(text: &Option<String>) -> Option<rt::TranslatedString> {
    text.as_ref().map(|t| rt::TranslatedString {
        translation: vec![rt::translated_string::Translation {
            text: t.clone(),
            language: None,
        }],
    })
}

impl From<&Alert> for rt::Alert {
    fn from(alert: &Alert) -> Self {
        Self {
            informed_entity: alert
                .informed_entities
                .iter()
                .map(|e| rt::EntitySelector {
                    agency_id: e.agency_id.clone(),
                    route_id: e.route_id.clone(),
                    trip: e.trip_id.as_ref().map(|id| rt::TripDescriptor {
                        trip_id: Some(id.clone()),
                        ..Default::default()
                    }),
                    stop_id: e.stop_id.clone(),
                    ..Default::default()
                })
                .collect(),
            url: translated(&alert.url),
            header_text: translated(&alert.header_text),
            description_text: translated(&alert.description_text),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> LiveMessage {
        LiveMessage {
            timestamp: 1_710_490_200,
            entities: vec![
                FeedEntity {
                    id: "tu-1".into(),
                    trip_update: Some(TripUpdate {
                        trip: TripDescriptor {
                            trip_id: Some("T1".into()),
                            route_id: Some("R1".into()),
                            start_date: Some("20240315".into()),
                            ..Default::default()
                        },
                        vehicle: Some(VehicleDescriptor {
                            id: Some("V7".into()),
                            ..Default::default()
                        }),
                        stop_time_updates: vec![StopTimeUpdate {
                            stop_sequence: Some(3),
                            stop_id: Some("S1".into()),
                            departure: Some(StopTimeEvent {
                                time: Some(1_710_490_320),
                                delay: Some(120),
                                uncertainty: None,
                            }),
                            ..Default::default()
                        }],
                        timestamp: Some(1_710_490_190),
                        delay: None,
                    }),
                    ..Default::default()
                },
                FeedEntity {
                    id: "alert-1".into(),
                    alert: Some(Alert {
                        header_text: Some("Detour".into()),
                        informed_entities: vec![InformedEntity {
                            route_id: Some("R1".into()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn encode_then_decode_preserves_message() {
        let msg = sample_message();
        let decoded = decode_message(&encode_message(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn deleted_entities_are_dropped() {
        let mut wire = rt::FeedMessage::from(&sample_message());
        wire.entity[1].is_deleted = Some(true);
        let msg = LiveMessage::from(wire);
        assert_eq!(msg.entities.len(), 1);
        assert_eq!(msg.entities[0].id, "tu-1");
    }

    #[test]
    fn english_translation_preferred() {
        let text = rt::TranslatedString {
            translation: vec![
                rt::translated_string::Translation {
                    text: "Déviation".into(),
                    language: Some("fr".into()),
                },
                rt::translated_string::Translation {
                    text: "Detour".into(),
                    language: Some("en-CA".into()),
                },
            ],
        };
        assert_eq!(translated_text(text).as_deref(), Some("Detour"));
    }

    #[test]
    fn unrecognised_trip_relationship_reads_as_scheduled() {
        let mut wire = rt::FeedMessage::from(&sample_message());
        if let Some(update) = wire.entity[0].trip_update.as_mut() {
            update.trip.schedule_relationship = Some(99);
        }
        let msg = LiveMessage::from(wire);
        let update = msg.entities[0].trip_update.as_ref().unwrap();
        assert_eq!(update.trip.schedule_relationship, TripRelationship::Scheduled);
    }

    #[test]
    fn canceled_trip_survives_encoding() {
        let mut msg = sample_message();
        if let Some(update) = msg.entities[0].trip_update.as_mut() {
            update.trip.schedule_relationship = TripRelationship::Canceled;
        }
        let decoded = decode_message(&encode_message(&msg)).unwrap();
        let update = decoded.entities[0].trip_update.as_ref().unwrap();
        assert_eq!(update.trip.schedule_relationship, TripRelationship::Canceled);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_message(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, FeedError::Decode { .. }));
    }
}
