//! Per-object-class property decoder registry

use crate::frame::EchonetObject;
use crate::property::{Property, RawProperty};
use crate::smart_meter;
use routeb_core::RouteBResult;
use std::collections::HashMap;

/// Decoder for one property code of one object class
///
/// The first argument is the EPC the decoder was registered for, so that one
/// function can serve several codes and still reject a foreign property.
pub type PropertyDecoder = fn(u8, &RawProperty) -> RouteBResult<Property>;

/// Property decoders keyed by (class group, class) and then EPC
#[derive(Debug, Clone)]
pub struct PropertyRegistry {
    classes: HashMap<(u8, u8), HashMap<u8, PropertyDecoder>>,
}

impl PropertyRegistry {
    /// Registry without any class
    #[must_use]
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    /// Register a decoder for one property of an object class
    ///
    /// Replaces any decoder previously registered for the same key.
    pub fn register(&mut self, class_group: u8, class: u8, epc: u8, decoder: PropertyDecoder) {
        self.classes
            .entry((class_group, class))
            .or_default()
            .insert(epc, decoder);
    }

    /// Register one decoder for several properties of an object class
    pub fn register_class(&mut self, class_group: u8, class: u8, epcs: &[u8], decoder: PropertyDecoder) {
        for &epc in epcs {
            self.register(class_group, class, epc, decoder);
        }
    }

    /// Whether a decoder exists for this class and property
    pub fn contains(&self, object: EchonetObject, epc: u8) -> bool {
        self.classes
            .get(&object.class_key())
            .is_some_and(|decoders| decoders.contains_key(&epc))
    }

    /// Decode a property reported by `object`
    ///
    /// Unregistered classes and properties yield `Property::Unknown`. A
    /// registered decoder that rejects the data also yields `Property::Unknown`
    /// after logging the reason; use `try_decode` to get the error instead.
    pub fn decode(&self, object: EchonetObject, raw: &RawProperty) -> Property {
        match self.try_decode(object, raw) {
            Ok(property) => property,
            Err(e) => {
                log::debug!(
                    "Keeping EPC 0x{:02X} of {} undecoded: {}",
                    raw.epc,
                    object,
                    e
                );
                Property::Unknown(raw.clone())
            }
        }
    }

    /// Decode a property, surfacing decoder errors
    pub fn try_decode(&self, object: EchonetObject, raw: &RawProperty) -> RouteBResult<Property> {
        let decoder = self
            .classes
            .get(&object.class_key())
            .and_then(|decoders| decoders.get(&raw.epc));
        match decoder {
            Some(decoder) => decoder(raw.epc, raw),
            None => Ok(Property::Unknown(raw.clone())),
        }
    }
}

impl Default for PropertyRegistry {
    /// Registry with the low-voltage smart electric energy meter class
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_class(
            smart_meter::CLASS_GROUP_CODE,
            smart_meter::CLASS_CODE,
            smart_meter::PROPERTY_CODES,
            smart_meter::decode_property,
        );
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smart_meter::SmartMeterProperty;
    use routeb_core::RouteBError;

    #[test]
    fn test_unregistered_class_is_unknown() {
        let registry = PropertyRegistry::default();
        let raw = RawProperty::new(0xE7, vec![0, 0, 0, 1]);
        let object = EchonetObject::new(0x01, 0x30, 0x01);
        assert!(!registry.contains(object, 0xE7));
        assert_eq!(registry.decode(object, &raw), Property::Unknown(raw));
    }

    #[test]
    fn test_unregistered_epc_is_unknown() {
        let registry = PropertyRegistry::default();
        let raw = RawProperty::new(0x9D, vec![0x01, 0x80]);
        assert_eq!(
            registry.decode(EchonetObject::SMART_METER, &raw),
            Property::Unknown(raw)
        );
    }

    #[test]
    fn test_rejected_data_falls_back() {
        let registry = PropertyRegistry::default();
        let raw = RawProperty::new(0xE7, vec![0x01, 0x2C]);
        assert!(matches!(
            registry.try_decode(EchonetObject::SMART_METER, &raw),
            Err(RouteBError::InvalidPropertyData(_))
        ));
        assert_eq!(
            registry.decode(EchonetObject::SMART_METER, &raw),
            Property::Unknown(raw)
        );
    }

    #[test]
    fn test_custom_decoder() {
        fn decode_fixed(epc: u8, raw: &RawProperty) -> RouteBResult<Property> {
            raw.expect_epc(epc)?;
            Ok(Property::SmartMeter(SmartMeterProperty::Coefficient(42)))
        }

        let mut registry = PropertyRegistry::empty();
        registry.register(0x01, 0x30, 0x80, decode_fixed);
        let object = EchonetObject::new(0x01, 0x30, 0x01);
        assert!(registry.contains(object, 0x80));
        assert_eq!(
            registry.decode(object, &RawProperty::new(0x80, vec![0x30])),
            Property::SmartMeter(SmartMeterProperty::Coefficient(42))
        );
    }
}
