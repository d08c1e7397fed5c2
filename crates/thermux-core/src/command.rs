//! Commands accepted between acquisition cycles
//!
//! The text form is one command per line:
//!
//! ```text
//! calibrate <1|2> <reference C>
//! clear
//! status
//! ```

use core::str::FromStr;

use thiserror_no_std::Error;

use crate::calibration::CalibrationPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Capture a calibration point at the given reference temperature
    Calibrate {
        point: CalibrationPoint,
        reference: f32,
    },
    /// Erase the stored calibration
    ClearCalibration,
    /// Publish the calibration status
    QueryStatus,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command")]
    Unknown,
    #[error("calibrate needs a point (1 or 2) and a reference temperature")]
    MissingArgument,
    #[error("calibration point must be 1 or 2")]
    InvalidPoint,
    #[error("reference temperature is not a number")]
    InvalidReference,
    #[error("unexpected trailing argument")]
    TrailingArgument,
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = match words.next().ok_or(ParseCommandError::Empty)? {
            "calibrate" | "cal" => {
                let point = words
                    .next()
                    .ok_or(ParseCommandError::MissingArgument)?
                    .parse::<u8>()
                    .ok()
                    .and_then(|point| CalibrationPoint::try_from(point).ok())
                    .ok_or(ParseCommandError::InvalidPoint)?;
                let reference = words
                    .next()
                    .ok_or(ParseCommandError::MissingArgument)?
                    .parse::<f32>()
                    .map_err(|_| ParseCommandError::InvalidReference)?;
                Command::Calibrate { point, reference }
            }
            "clear" => Command::ClearCalibration,
            "status" | "calibrated?" => Command::QueryStatus,
            _ => return Err(ParseCommandError::Unknown),
        };

        if words.next().is_some() {
            return Err(ParseCommandError::TrailingArgument);
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calibrate() {
        assert_eq!(
            "calibrate 2 99.5".parse::<Command>(),
            Ok(Command::Calibrate {
                point: CalibrationPoint::High,
                reference: 99.5
            })
        );
        assert_eq!(
            "  cal 1   -10 ".parse::<Command>(),
            Ok(Command::Calibrate {
                point: CalibrationPoint::Low,
                reference: -10.0
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<Command>(), Err(ParseCommandError::Empty));
        assert_eq!("reboot".parse::<Command>(), Err(ParseCommandError::Unknown));
        assert_eq!(
            "calibrate 3 20".parse::<Command>(),
            Err(ParseCommandError::InvalidPoint)
        );
        assert_eq!(
            "calibrate 1".parse::<Command>(),
            Err(ParseCommandError::MissingArgument)
        );
        assert_eq!(
            "calibrate 1 warm".parse::<Command>(),
            Err(ParseCommandError::InvalidReference)
        );
        assert_eq!(
            "clear now".parse::<Command>(),
            Err(ParseCommandError::TrailingArgument)
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("clear".parse::<Command>(), Ok(Command::ClearCalibration));
        assert_eq!("status".parse::<Command>(), Ok(Command::QueryStatus));
        assert_eq!("calibrated?".parse::<Command>(), Ok(Command::QueryStatus));
    }
}
