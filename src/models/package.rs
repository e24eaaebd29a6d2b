// src/models/package.rs

use std::fmt;

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a package. The serialized literals are the values
/// stored in the database and exchanged with clients; they must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageState {
    /// Open offer, no carrier yet.
    #[serde(rename = "Publicado")]
    Published,
    /// Sent by its owner directly to a chosen traveler.
    #[serde(rename = "Proceso")]
    Requested,
    /// A traveler offered to carry an open package.
    #[serde(rename = "Aceptado")]
    Suggested,
    /// Owner and traveler agreed; ready for the shipping pipeline.
    #[serde(rename = "Aprobado")]
    Approved,
    /// Picked up at the origin branch.
    #[serde(rename = "Enviado")]
    Shipped,
    /// En route to the destination branch.
    #[serde(rename = "Entregado")]
    InTransitToLocal,
    /// Arrived at the destination branch.
    #[serde(rename = "Recibido")]
    ReceivedAtLocal,
    /// Handed to the receiver.
    #[serde(rename = "Completado")]
    Completed,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl PackageState {
    /// States from which the owner (or an admin) may cancel. Once the
    /// shipping pipeline has started the package can no longer be
    /// withdrawn.
    pub const CANCELLATION_SOURCES: [PackageState; 3] = [
        PackageState::Published,
        PackageState::Requested,
        PackageState::Approved,
    ];

    pub fn wire(self) -> &'static str {
        match self {
            PackageState::Published => "Publicado",
            PackageState::Requested => "Proceso",
            PackageState::Suggested => "Aceptado",
            PackageState::Approved => "Aprobado",
            PackageState::Shipped => "Enviado",
            PackageState::InTransitToLocal => "Entregado",
            PackageState::ReceivedAtLocal => "Recibido",
            PackageState::Completed => "Completado",
            PackageState::Cancelled => "Cancelado",
        }
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub description: String,
    pub weight: f64,
    /// Reference into the image store, never raw bytes.
    pub image: String,
    pub receiver_name: String,
    pub receiver_surname: String,
    pub receiver_city: String,
    pub receiver_street: String,
    pub receiver_phone: String,
    pub state: PackageState,
    pub proprietor: ObjectId,
    /// None while Publicado; set when a traveler is matched.
    pub traveler: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PackageState; 9] = [
        PackageState::Published,
        PackageState::Requested,
        PackageState::Suggested,
        PackageState::Approved,
        PackageState::Shipped,
        PackageState::InTransitToLocal,
        PackageState::ReceivedAtLocal,
        PackageState::Completed,
        PackageState::Cancelled,
    ];

    #[test]
    fn wire_literals_round_trip_through_serde() {
        for state in ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.wire()));
            let back: PackageState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
    }

    #[test]
    fn wire_literals_are_the_spanish_labels() {
        assert_eq!(PackageState::Published.wire(), "Publicado");
        assert_eq!(PackageState::Requested.wire(), "Proceso");
        assert_eq!(PackageState::Suggested.wire(), "Aceptado");
        assert_eq!(PackageState::Approved.wire(), "Aprobado");
        assert_eq!(PackageState::Shipped.wire(), "Enviado");
        assert_eq!(PackageState::InTransitToLocal.wire(), "Entregado");
        assert_eq!(PackageState::ReceivedAtLocal.wire(), "Recibido");
        assert_eq!(PackageState::Completed.wire(), "Completado");
        assert_eq!(PackageState::Cancelled.wire(), "Cancelado");
    }

    #[test]
    fn cancellation_stops_once_the_pipeline_starts() {
        for state in [
            PackageState::Published,
            PackageState::Requested,
            PackageState::Approved,
        ] {
            assert!(PackageState::CANCELLATION_SOURCES.contains(&state));
        }
        for state in [
            PackageState::Shipped,
            PackageState::InTransitToLocal,
            PackageState::ReceivedAtLocal,
            PackageState::Completed,
            PackageState::Cancelled,
        ] {
            assert!(!PackageState::CANCELLATION_SOURCES.contains(&state));
        }
    }

    #[test]
    fn package_serializes_with_camel_case_fields_and_wire_state() {
        let package = Package {
            id: None,
            description: "Books".to_string(),
            weight: 2.5,
            image: "abc.png".to_string(),
            receiver_name: "Ana".to_string(),
            receiver_surname: "Obiang".to_string(),
            receiver_city: "Malabo".to_string(),
            receiver_street: "Calle 3".to_string(),
            receiver_phone: "+240222000111".to_string(),
            state: PackageState::Published,
            proprietor: ObjectId::new(),
            traveler: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        let value = serde_json::to_value(&package).unwrap();
        assert_eq!(value["state"], "Publicado");
        assert_eq!(value["receiverCity"], "Malabo");
        assert!(value["traveler"].is_null());
    }
}
