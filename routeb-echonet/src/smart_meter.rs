//! Low-voltage smart electric energy meter class (class group 0x02, class 0x88)
//!
//! Every property decodes from and encodes back to the exact bytes the meter
//! sends, so `SmartMeterProperty::decode(&p.encode()) == Ok(p)` holds for each
//! variant. Multi-byte integers are big-endian.

use crate::property::{Property, RawProperty};
use routeb_core::{RouteBError, RouteBResult};

pub const CLASS_GROUP_CODE: u8 = 0x02;
pub const CLASS_CODE: u8 = 0x88;

pub const EPC_OPERATION_STATUS: u8 = 0x80;
pub const EPC_ROUTE_B_ID: u8 = 0xC0;
pub const EPC_ONE_MINUTE_CUMULATIVE_ENERGY: u8 = 0xD0;
pub const EPC_COEFFICIENT: u8 = 0xD3;
pub const EPC_EFFECTIVE_DIGITS: u8 = 0xD7;
pub const EPC_CUMULATIVE_ENERGY_NORMAL: u8 = 0xE0;
pub const EPC_CUMULATIVE_ENERGY_UNIT: u8 = 0xE1;
pub const EPC_HISTORY_1_NORMAL: u8 = 0xE2;
pub const EPC_CUMULATIVE_ENERGY_REVERSE: u8 = 0xE3;
pub const EPC_HISTORY_1_REVERSE: u8 = 0xE4;
pub const EPC_HISTORY_DAY_1: u8 = 0xE5;
pub const EPC_INSTANTANEOUS_POWER: u8 = 0xE7;
pub const EPC_INSTANTANEOUS_CURRENTS: u8 = 0xE8;
pub const EPC_FIXED_TIME_ENERGY_NORMAL: u8 = 0xEA;
pub const EPC_FIXED_TIME_ENERGY_REVERSE: u8 = 0xEB;
pub const EPC_HISTORY_2: u8 = 0xEC;
pub const EPC_HISTORY_DAY_2: u8 = 0xED;
pub const EPC_HISTORY_3: u8 = 0xEE;
pub const EPC_HISTORY_DAY_3: u8 = 0xEF;

/// Every property code this module decodes
pub const PROPERTY_CODES: &[u8] = &[
    EPC_OPERATION_STATUS,
    EPC_ROUTE_B_ID,
    EPC_ONE_MINUTE_CUMULATIVE_ENERGY,
    EPC_COEFFICIENT,
    EPC_EFFECTIVE_DIGITS,
    EPC_CUMULATIVE_ENERGY_NORMAL,
    EPC_CUMULATIVE_ENERGY_UNIT,
    EPC_HISTORY_1_NORMAL,
    EPC_CUMULATIVE_ENERGY_REVERSE,
    EPC_HISTORY_1_REVERSE,
    EPC_HISTORY_DAY_1,
    EPC_INSTANTANEOUS_POWER,
    EPC_INSTANTANEOUS_CURRENTS,
    EPC_FIXED_TIME_ENERGY_NORMAL,
    EPC_FIXED_TIME_ENERGY_REVERSE,
    EPC_HISTORY_2,
    EPC_HISTORY_DAY_2,
    EPC_HISTORY_3,
    EPC_HISTORY_DAY_3,
];

const OPERATION_ON: u8 = 0x30;
const OPERATION_OFF: u8 = 0x31;

/// Half-hour slots in one day of history 1
pub const HISTORY_1_SLOTS: usize = 48;

const HISTORY_1_LEN: usize = 2 + HISTORY_1_SLOTS * 4;
const HISTORY_HEADER_LEN: usize = 7;

/// Registry entry point for this class
pub fn decode_property(epc: u8, raw: &RawProperty) -> RouteBResult<Property> {
    raw.expect_epc(epc)?;
    SmartMeterProperty::decode(raw).map(Property::SmartMeter)
}

/// Meter timestamp
///
/// Carried as year (2 bytes), month, day, hour, minute and, in the 7-byte
/// form, second. Fields are kept exactly as received; the meter uses 0xFF
/// filler for unset values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeterDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl MeterDateTime {
    fn from_minutes(b: &[u8]) -> Self {
        Self {
            year: u16::from_be_bytes([b[0], b[1]]),
            month: b[2],
            day: b[3],
            hour: b[4],
            minute: b[5],
            second: 0,
        }
    }

    fn from_seconds(b: &[u8]) -> Self {
        Self {
            second: b[6],
            ..Self::from_minutes(b)
        }
    }

    fn put_minutes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.year.to_be_bytes());
        out.extend_from_slice(&[self.month, self.day, self.hour, self.minute]);
    }

    fn put_seconds(&self, out: &mut Vec<u8>) {
        self.put_minutes(out);
        out.push(self.second);
    }
}

/// Route-B identification number (0xC0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteBIdentification {
    pub prefix: u8,
    pub manufacturer_code: [u8; 3],
    pub free_area: [u8; 12],
}

/// Cumulative energy measured at a point in time, both directions (0xD0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneMinuteCumulativeEnergy {
    pub measured_at: MeterDateTime,
    pub normal: u32,
    pub reverse: u32,
}

/// Unit of the cumulative energy values (0xE1)
///
/// The raw code is kept; `multiplier` maps the codes defined for this class
/// onto kWh multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyUnit(pub u8);

impl EnergyUnit {
    /// kWh per count, or `None` for an undefined code
    pub fn multiplier(&self) -> Option<f64> {
        let value = match self.0 {
            0x00 => 1.0,
            0x01 => 0.1,
            0x02 => 0.01,
            0x03 => 0.001,
            0x04 => 0.0001,
            0x0A => 10.0,
            0x0B => 100.0,
            0x0C => 1000.0,
            0x0D => 10000.0,
            _ => return None,
        };
        Some(value)
    }
}

/// Half-hourly cumulative energy for one collection day (0xE2, 0xE4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyHistory {
    /// Days before today (0 = today)
    pub day: u16,
    /// 48 half-hour readings starting at 00:00
    pub values: Vec<u32>,
}

/// Instantaneous currents in units of 0.1 A (0xE8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantaneousCurrents {
    pub r_phase: i16,
    pub t_phase: i16,
}

impl InstantaneousCurrents {
    /// T phase value used by single-phase two-wire meters
    pub const NO_PHASE: i16 = 0x7FFE;

    pub fn r_amperes(&self) -> f32 {
        f32::from(self.r_phase) / 10.0
    }

    /// `None` on single-phase two-wire meters
    pub fn t_amperes(&self) -> Option<f32> {
        (self.t_phase != Self::NO_PHASE).then(|| f32::from(self.t_phase) / 10.0)
    }
}

/// Cumulative energy at the last fixed time (0xEA, 0xEB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTimeEnergy {
    pub measured_at: MeterDateTime,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyValuePair {
    pub normal: u32,
    pub reverse: u32,
}

/// History 2/3: consecutive segments from a collection point (0xEC, 0xEE)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedEnergyHistory {
    pub collected_at: MeterDateTime,
    /// One pair per segment; the segment count byte is `values.len()`
    pub values: Vec<EnergyValuePair>,
}

/// Collection point for history 2/3 (0xED, 0xEF)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCollectionPoint {
    pub collected_at: MeterDateTime,
    pub segments: u8,
}

/// Decoded property of the low-voltage smart electric energy meter class
#[derive(Debug, Clone, PartialEq)]
pub enum SmartMeterProperty {
    /// 0x80, `true` when the meter reports ON (0x30)
    OperationStatus(bool),
    RouteBIdentification(RouteBIdentification),
    OneMinuteCumulativeEnergy(OneMinuteCumulativeEnergy),
    Coefficient(u32),
    EffectiveDigits(u8),
    CumulativeEnergyNormal(u32),
    CumulativeEnergyUnit(EnergyUnit),
    HistoryNormal(EnergyHistory),
    CumulativeEnergyReverse(u32),
    HistoryReverse(EnergyHistory),
    HistoryDay(u8),
    /// 0xE7, in watts
    InstantaneousPower(i32),
    InstantaneousCurrents(InstantaneousCurrents),
    FixedTimeEnergyNormal(FixedTimeEnergy),
    FixedTimeEnergyReverse(FixedTimeEnergy),
    History2(SegmentedEnergyHistory),
    HistoryDay2(HistoryCollectionPoint),
    History3(SegmentedEnergyHistory),
    HistoryDay3(HistoryCollectionPoint),
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn decode_history_1(raw: &RawProperty) -> RouteBResult<EnergyHistory> {
    raw.expect_len(HISTORY_1_LEN)?;
    Ok(EnergyHistory {
        day: u16::from_be_bytes([raw.edt[0], raw.edt[1]]),
        values: raw.edt[2..].chunks_exact(4).map(be_u32).collect(),
    })
}

fn decode_segmented(raw: &RawProperty) -> RouteBResult<SegmentedEnergyHistory> {
    if raw.edt.len() < HISTORY_HEADER_LEN {
        return Err(RouteBError::InvalidPropertyData(format!(
            "EPC 0x{:02X}: expected at least {} bytes, got {}",
            raw.epc,
            HISTORY_HEADER_LEN,
            raw.edt.len()
        )));
    }
    let segments = usize::from(raw.edt[6]);
    raw.expect_len(HISTORY_HEADER_LEN + segments * 8)?;
    Ok(SegmentedEnergyHistory {
        collected_at: MeterDateTime::from_minutes(&raw.edt[..6]),
        values: raw.edt[HISTORY_HEADER_LEN..]
            .chunks_exact(8)
            .map(|pair| EnergyValuePair {
                normal: be_u32(&pair[..4]),
                reverse: be_u32(&pair[4..]),
            })
            .collect(),
    })
}

fn decode_collection_point(raw: &RawProperty) -> RouteBResult<HistoryCollectionPoint> {
    raw.expect_len(7)?;
    Ok(HistoryCollectionPoint {
        collected_at: MeterDateTime::from_minutes(&raw.edt[..6]),
        segments: raw.edt[6],
    })
}

fn decode_fixed_time(raw: &RawProperty) -> RouteBResult<FixedTimeEnergy> {
    raw.expect_len(11)?;
    Ok(FixedTimeEnergy {
        measured_at: MeterDateTime::from_seconds(&raw.edt[..7]),
        value: be_u32(&raw.edt[7..]),
    })
}

fn decode_u32(raw: &RawProperty) -> RouteBResult<u32> {
    raw.expect_len(4)?;
    Ok(be_u32(&raw.edt))
}

fn decode_i32(raw: &RawProperty) -> RouteBResult<i32> {
    raw.expect_len(4)?;
    Ok(i32::from_be_bytes([raw.edt[0], raw.edt[1], raw.edt[2], raw.edt[3]]))
}

fn decode_u8(raw: &RawProperty) -> RouteBResult<u8> {
    raw.expect_len(1)?;
    Ok(raw.edt[0])
}

impl SmartMeterProperty {
    /// Decode a raw property of this class, dispatching on its EPC
    ///
    /// # Returns
    ///
    /// `InvalidPropertyData` if the EPC is not defined for this class or the
    /// data length breaks the property's contract
    pub fn decode(raw: &RawProperty) -> RouteBResult<Self> {
        let property = match raw.epc {
            EPC_OPERATION_STATUS => match decode_u8(raw)? {
                OPERATION_ON => Self::OperationStatus(true),
                OPERATION_OFF => Self::OperationStatus(false),
                other => {
                    return Err(RouteBError::InvalidPropertyData(format!(
                        "Invalid operation status 0x{:02X}",
                        other
                    )));
                }
            },
            EPC_ROUTE_B_ID => {
                raw.expect_len(16)?;
                let mut manufacturer_code = [0u8; 3];
                manufacturer_code.copy_from_slice(&raw.edt[1..4]);
                let mut free_area = [0u8; 12];
                free_area.copy_from_slice(&raw.edt[4..]);
                Self::RouteBIdentification(RouteBIdentification {
                    prefix: raw.edt[0],
                    manufacturer_code,
                    free_area,
                })
            }
            EPC_ONE_MINUTE_CUMULATIVE_ENERGY => {
                raw.expect_len(15)?;
                Self::OneMinuteCumulativeEnergy(OneMinuteCumulativeEnergy {
                    measured_at: MeterDateTime::from_seconds(&raw.edt[..7]),
                    normal: be_u32(&raw.edt[7..11]),
                    reverse: be_u32(&raw.edt[11..]),
                })
            }
            EPC_COEFFICIENT => Self::Coefficient(decode_u32(raw)?),
            EPC_EFFECTIVE_DIGITS => Self::EffectiveDigits(decode_u8(raw)?),
            EPC_CUMULATIVE_ENERGY_NORMAL => Self::CumulativeEnergyNormal(decode_u32(raw)?),
            EPC_CUMULATIVE_ENERGY_UNIT => Self::CumulativeEnergyUnit(EnergyUnit(decode_u8(raw)?)),
            EPC_HISTORY_1_NORMAL => Self::HistoryNormal(decode_history_1(raw)?),
            EPC_CUMULATIVE_ENERGY_REVERSE => Self::CumulativeEnergyReverse(decode_u32(raw)?),
            EPC_HISTORY_1_REVERSE => Self::HistoryReverse(decode_history_1(raw)?),
            EPC_HISTORY_DAY_1 => Self::HistoryDay(decode_u8(raw)?),
            EPC_INSTANTANEOUS_POWER => Self::InstantaneousPower(decode_i32(raw)?),
            EPC_INSTANTANEOUS_CURRENTS => {
                raw.expect_len(4)?;
                Self::InstantaneousCurrents(InstantaneousCurrents {
                    r_phase: i16::from_be_bytes([raw.edt[0], raw.edt[1]]),
                    t_phase: i16::from_be_bytes([raw.edt[2], raw.edt[3]]),
                })
            }
            EPC_FIXED_TIME_ENERGY_NORMAL => Self::FixedTimeEnergyNormal(decode_fixed_time(raw)?),
            EPC_FIXED_TIME_ENERGY_REVERSE => Self::FixedTimeEnergyReverse(decode_fixed_time(raw)?),
            EPC_HISTORY_2 => Self::History2(decode_segmented(raw)?),
            EPC_HISTORY_DAY_2 => Self::HistoryDay2(decode_collection_point(raw)?),
            EPC_HISTORY_3 => Self::History3(decode_segmented(raw)?),
            EPC_HISTORY_DAY_3 => Self::HistoryDay3(decode_collection_point(raw)?),
            other => {
                return Err(RouteBError::InvalidPropertyData(format!(
                    "EPC 0x{:02X} is not defined for the smart meter class",
                    other
                )));
            }
        };
        Ok(property)
    }

    /// Property code of this variant
    pub fn epc(&self) -> u8 {
        match self {
            Self::OperationStatus(_) => EPC_OPERATION_STATUS,
            Self::RouteBIdentification(_) => EPC_ROUTE_B_ID,
            Self::OneMinuteCumulativeEnergy(_) => EPC_ONE_MINUTE_CUMULATIVE_ENERGY,
            Self::Coefficient(_) => EPC_COEFFICIENT,
            Self::EffectiveDigits(_) => EPC_EFFECTIVE_DIGITS,
            Self::CumulativeEnergyNormal(_) => EPC_CUMULATIVE_ENERGY_NORMAL,
            Self::CumulativeEnergyUnit(_) => EPC_CUMULATIVE_ENERGY_UNIT,
            Self::HistoryNormal(_) => EPC_HISTORY_1_NORMAL,
            Self::CumulativeEnergyReverse(_) => EPC_CUMULATIVE_ENERGY_REVERSE,
            Self::HistoryReverse(_) => EPC_HISTORY_1_REVERSE,
            Self::HistoryDay(_) => EPC_HISTORY_DAY_1,
            Self::InstantaneousPower(_) => EPC_INSTANTANEOUS_POWER,
            Self::InstantaneousCurrents(_) => EPC_INSTANTANEOUS_CURRENTS,
            Self::FixedTimeEnergyNormal(_) => EPC_FIXED_TIME_ENERGY_NORMAL,
            Self::FixedTimeEnergyReverse(_) => EPC_FIXED_TIME_ENERGY_REVERSE,
            Self::History2(_) => EPC_HISTORY_2,
            Self::HistoryDay2(_) => EPC_HISTORY_DAY_2,
            Self::History3(_) => EPC_HISTORY_3,
            Self::HistoryDay3(_) => EPC_HISTORY_DAY_3,
        }
    }

    /// Encode into wire form
    pub fn encode(&self) -> RawProperty {
        let mut edt = Vec::new();
        match self {
            Self::OperationStatus(on) => {
                edt.push(if *on { OPERATION_ON } else { OPERATION_OFF });
            }
            Self::RouteBIdentification(id) => {
                edt.push(id.prefix);
                edt.extend_from_slice(&id.manufacturer_code);
                edt.extend_from_slice(&id.free_area);
            }
            Self::OneMinuteCumulativeEnergy(energy) => {
                energy.measured_at.put_seconds(&mut edt);
                edt.extend_from_slice(&energy.normal.to_be_bytes());
                edt.extend_from_slice(&energy.reverse.to_be_bytes());
            }
            Self::Coefficient(value)
            | Self::CumulativeEnergyNormal(value)
            | Self::CumulativeEnergyReverse(value) => {
                edt.extend_from_slice(&value.to_be_bytes());
            }
            Self::EffectiveDigits(value) | Self::HistoryDay(value) => edt.push(*value),
            Self::CumulativeEnergyUnit(unit) => edt.push(unit.0),
            Self::HistoryNormal(history) | Self::HistoryReverse(history) => {
                edt.extend_from_slice(&history.day.to_be_bytes());
                for value in &history.values {
                    edt.extend_from_slice(&value.to_be_bytes());
                }
            }
            Self::InstantaneousPower(watts) => edt.extend_from_slice(&watts.to_be_bytes()),
            Self::InstantaneousCurrents(currents) => {
                edt.extend_from_slice(&currents.r_phase.to_be_bytes());
                edt.extend_from_slice(&currents.t_phase.to_be_bytes());
            }
            Self::FixedTimeEnergyNormal(energy) | Self::FixedTimeEnergyReverse(energy) => {
                energy.measured_at.put_seconds(&mut edt);
                edt.extend_from_slice(&energy.value.to_be_bytes());
            }
            Self::History2(history) | Self::History3(history) => {
                history.collected_at.put_minutes(&mut edt);
                // The segment byte saturates; such a history cannot be valid
                edt.push(u8::try_from(history.values.len()).unwrap_or(u8::MAX));
                for pair in &history.values {
                    edt.extend_from_slice(&pair.normal.to_be_bytes());
                    edt.extend_from_slice(&pair.reverse.to_be_bytes());
                }
            }
            Self::HistoryDay2(point) | Self::HistoryDay3(point) => {
                point.collected_at.put_minutes(&mut edt);
                edt.push(point.segments);
            }
        }
        RawProperty::new(self.epc(), edt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(property: SmartMeterProperty) {
        let raw = property.encode();
        assert_eq!(raw.epc, property.epc());
        assert_eq!(SmartMeterProperty::decode(&raw).unwrap(), property);
    }

    #[test]
    fn test_instantaneous_power() {
        let raw = RawProperty::new(EPC_INSTANTANEOUS_POWER, vec![0x00, 0x00, 0x01, 0x2C]);
        assert_eq!(
            SmartMeterProperty::decode(&raw).unwrap(),
            SmartMeterProperty::InstantaneousPower(300)
        );

        // Negative while feeding back into the grid
        let raw = RawProperty::new(EPC_INSTANTANEOUS_POWER, vec![0xFF, 0xFF, 0xFF, 0x9C]);
        assert_eq!(
            SmartMeterProperty::decode(&raw).unwrap(),
            SmartMeterProperty::InstantaneousPower(-100)
        );

        let raw = RawProperty::new(EPC_INSTANTANEOUS_POWER, vec![0x80, 0x00, 0x00, 0x00]);
        assert_eq!(
            SmartMeterProperty::decode(&raw).unwrap(),
            SmartMeterProperty::InstantaneousPower(i32::MIN)
        );
        let raw = RawProperty::new(EPC_INSTANTANEOUS_POWER, vec![0xFF, 0x9C]);
        assert!(SmartMeterProperty::decode(&raw).is_err());
    }

    #[test]
    fn test_registered_decoder_rejects_foreign_epc() {
        let raw = RawProperty::new(EPC_CUMULATIVE_ENERGY_NORMAL, vec![0, 0, 0, 1]);
        assert!(matches!(
            decode_property(EPC_INSTANTANEOUS_POWER, &raw),
            Err(RouteBError::PropertyMismatch {
                expected: EPC_INSTANTANEOUS_POWER,
                actual: EPC_CUMULATIVE_ENERGY_NORMAL
            })
        ));
    }

    #[test]
    fn test_length_contract() {
        for (epc, len) in [
            (EPC_OPERATION_STATUS, 2),
            (EPC_ROUTE_B_ID, 15),
            (EPC_ONE_MINUTE_CUMULATIVE_ENERGY, 14),
            (EPC_INSTANTANEOUS_POWER, 2),
            (EPC_HISTORY_1_NORMAL, 193),
            (EPC_FIXED_TIME_ENERGY_REVERSE, 10),
            (EPC_HISTORY_DAY_2, 6),
            (EPC_HISTORY_2, 6),
        ] {
            let raw = RawProperty::new(epc, vec![0u8; len]);
            assert!(
                matches!(
                    SmartMeterProperty::decode(&raw),
                    Err(RouteBError::InvalidPropertyData(_))
                ),
                "EPC 0x{:02X} accepted {} bytes",
                epc,
                len
            );
        }
    }

    #[test]
    fn test_operation_status() {
        let on = RawProperty::new(EPC_OPERATION_STATUS, vec![0x30]);
        assert_eq!(
            SmartMeterProperty::decode(&on).unwrap(),
            SmartMeterProperty::OperationStatus(true)
        );
        let invalid = RawProperty::new(EPC_OPERATION_STATUS, vec![0x32]);
        assert!(SmartMeterProperty::decode(&invalid).is_err());
        round_trip(SmartMeterProperty::OperationStatus(false));
    }

    #[test]
    fn test_energy_unit() {
        assert_eq!(EnergyUnit(0x01).multiplier(), Some(0.1));
        assert_eq!(EnergyUnit(0x0D).multiplier(), Some(10000.0));
        assert_eq!(EnergyUnit(0x05).multiplier(), None);
        round_trip(SmartMeterProperty::CumulativeEnergyUnit(EnergyUnit(0x05)));
    }

    #[test]
    fn test_currents() {
        let raw = RawProperty::new(EPC_INSTANTANEOUS_CURRENTS, vec![0x00, 0x1E, 0x7F, 0xFE]);
        let SmartMeterProperty::InstantaneousCurrents(currents) =
            SmartMeterProperty::decode(&raw).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(currents.r_amperes(), 3.0);
        assert_eq!(currents.t_amperes(), None);
    }

    #[test]
    fn test_segmented_history() {
        let mut edt = vec![0x07, 0xE8, 0x05, 0x01, 0x0C, 0x1E, 0x02];
        edt.extend_from_slice(&[0, 0, 0, 10, 0, 0, 0, 1]);
        edt.extend_from_slice(&[0, 0, 0, 12, 0, 0, 0, 1]);
        let raw = RawProperty::new(EPC_HISTORY_2, edt);
        let property = SmartMeterProperty::decode(&raw).unwrap();
        let SmartMeterProperty::History2(history) = &property else {
            panic!("wrong variant");
        };
        assert_eq!(history.collected_at.year, 2024);
        assert_eq!(history.collected_at.minute, 30);
        assert_eq!(history.values.len(), 2);
        assert_eq!(history.values[1].normal, 12);
        assert_eq!(property.encode(), raw);

        // Segment count disagrees with the data
        let raw = RawProperty::new(EPC_HISTORY_3, vec![0x07, 0xE8, 5, 1, 12, 30, 1]);
        assert!(SmartMeterProperty::decode(&raw).is_err());
    }

    #[test]
    fn test_round_trips() {
        let at = MeterDateTime {
            year: 2024,
            month: 5,
            day: 1,
            hour: 12,
            minute: 30,
            second: 15,
        };
        round_trip(SmartMeterProperty::RouteBIdentification(RouteBIdentification {
            prefix: 0xFE,
            manufacturer_code: *b"ABC",
            free_area: *b"0123456789AB",
        }));
        round_trip(SmartMeterProperty::OneMinuteCumulativeEnergy(
            OneMinuteCumulativeEnergy {
                measured_at: at,
                normal: 12345,
                reverse: 6,
            },
        ));
        round_trip(SmartMeterProperty::Coefficient(1));
        round_trip(SmartMeterProperty::EffectiveDigits(6));
        round_trip(SmartMeterProperty::HistoryNormal(EnergyHistory {
            day: 1,
            values: (0..HISTORY_1_SLOTS as u32).collect(),
        }));
        round_trip(SmartMeterProperty::HistoryDay(3));
        round_trip(SmartMeterProperty::InstantaneousCurrents(InstantaneousCurrents {
            r_phase: -12,
            t_phase: 40,
        }));
        round_trip(SmartMeterProperty::FixedTimeEnergyNormal(FixedTimeEnergy {
            measured_at: at,
            value: 99,
        }));
        round_trip(SmartMeterProperty::HistoryDay3(HistoryCollectionPoint {
            collected_at: MeterDateTime { second: 0, ..at },
            segments: 12,
        }));
    }
}
