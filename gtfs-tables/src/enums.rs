use crate::serde_helpers::OrdinalOrLabel;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Declares a GTFS-realtime enumeration
///
/// It deserializes from its ordinal (`2`), its ordinal as a string (`"2"`) or its protobuf
/// label (`"FEW_SEATS_AVAILABLE"`), and always serializes as the ordinal.
/// Unknown ordinals are kept in the `Unknown` variant.
macro_rules! realtime_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $ordinal:literal, $label:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq, Hash)]
        #[derivative(Default(bound = ""))]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )*
            /// An unknown value
            Unknown(i32),
        }

        impl $name {
            /// Variant of an ordinal, [Self::Unknown] if it is not defined
            pub fn from_ordinal(ordinal: i32) -> Self {
                match ordinal {
                    $($ordinal => $name::$variant,)*
                    other => $name::Unknown(other),
                }
            }

            /// Ordinal as defined in gtfs-realtime.proto
            pub fn ordinal(&self) -> i32 {
                match self {
                    $($name::$variant => $ordinal,)*
                    $name::Unknown(other) => *other,
                }
            }

            fn from_label(label: &str) -> Option<Self> {
                match label {
                    $($label => Some($name::$variant),)*
                    _ => None,
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<$name, D::Error>
            where
                D: Deserializer<'de>,
            {
                match OrdinalOrLabel::deserialize(deserializer)? {
                    OrdinalOrLabel::Ordinal(ordinal) => Ok($name::from_ordinal(ordinal)),
                    OrdinalOrLabel::Label(label) => $name::from_label(&label)
                        .or_else(|| label.trim().parse().ok().map($name::from_ordinal))
                        .ok_or_else(|| {
                            de::Error::custom(format!(
                                "invalid value for {}: {}",
                                stringify!($name),
                                label
                            ))
                        }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_i32(self.ordinal())
            }
        }
    };
}

realtime_enum! {
    /// Whether a feed message is a full snapshot or a difference with the previous one
    Incrementality {
        /// The message replaces all the previous state
        #[derivative(Default)]
        FullDataset = 0, "FULL_DATASET";
        /// Only changed entities are sent
        Differential = 1, "DIFFERENTIAL";
    }
}

realtime_enum! {
    /// Relation between a realtime trip and the static schedule
    ScheduleRelationship {
        /// Trip running in accordance with its schedule
        #[derivative(Default)]
        Scheduled = 0, "SCHEDULED";
        /// Extra trip, not in the schedule
        Added = 1, "ADDED";
        /// Trip running without a schedule (frequency based)
        Unscheduled = 2, "UNSCHEDULED";
        /// Scheduled trip that was removed
        Canceled = 3, "CANCELED";
        /// Copy of a scheduled trip with a different start
        Duplicated = 4, "DUPLICATED";
        /// Trip removed and that should not be shown to riders
        Deleted = 5, "DELETED";
    }
}

realtime_enum! {
    /// How full the vehicle is
    OccupancyStatus {
        /// No passenger
        Empty = 0, "EMPTY";
        /// Large number of seats available
        ManySeatsAvailable = 1, "MANY_SEATS_AVAILABLE";
        /// Small number of seats available
        FewSeatsAvailable = 2, "FEW_SEATS_AVAILABLE";
        /// Only standing room
        StandingRoomOnly = 3, "STANDING_ROOM_ONLY";
        /// Only standing room, and little of it
        CrushedStandingRoomOnly = 4, "CRUSHED_STANDING_ROOM_ONLY";
        /// Considered full by the operator
        Full = 5, "FULL";
        /// Not accepting passengers
        NotAcceptingPassengers = 6, "NOT_ACCEPTING_PASSENGERS";
        /// The vehicle does not report occupancy
        #[derivative(Default)]
        NoDataAvailable = 7, "NO_DATA_AVAILABLE";
        /// Not boardable (e.g. a locked carriage)
        NotBoardable = 8, "NOT_BOARDABLE";
    }
}
