use std::fmt;

use serde::{Deserialize, Serialize};

pub type Identity = String;
pub type FlightCode = String;
pub type Timestamp = u64;
pub type Micro = u64;

pub const UNIT_MICRO: Micro = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FlightStatusCode {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatusCode {
    pub const ALL: [FlightStatusCode; 6] = [
        FlightStatusCode::Unknown,
        FlightStatusCode::OnTime,
        FlightStatusCode::LateAirline,
        FlightStatusCode::LateWeather,
        FlightStatusCode::LateTechnical,
        FlightStatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        match self {
            FlightStatusCode::Unknown => 0,
            FlightStatusCode::OnTime => 10,
            FlightStatusCode::LateAirline => 20,
            FlightStatusCode::LateWeather => 30,
            FlightStatusCode::LateTechnical => 40,
            FlightStatusCode::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Only a delay attributed to the airline pays out.
    pub fn is_insured_delay(self) -> bool {
        matches!(self, FlightStatusCode::LateAirline)
    }
}

impl TryFrom<u8> for FlightStatusCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown flight status code {code}"))
    }
}

impl From<FlightStatusCode> for u8 {
    fn from(status: FlightStatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for FlightStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: Identity,
    pub flight_code: FlightCode,
    pub departure_timestamp: Timestamp,
}

impl FlightKey {
    pub fn new(airline: &str, flight_code: &str, departure_timestamp: Timestamp) -> Self {
        Self {
            airline: airline.to_string(),
            flight_code: flight_code.to_string(),
            departure_timestamp,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.airline, self.flight_code, self.departure_timestamp
        )
    }
}
