use serde::de::DeserializeOwned;

/// Destination for a decoded request or response body.
///
/// Codecs hand the sink a type-erased deserializer positioned on the body
/// value; the sink decides which concrete type to produce.
pub trait BodySink {
    fn decode(
        &mut self,
        de: &mut dyn erased_serde::Deserializer<'_>,
    ) -> Result<(), erased_serde::Error>;
}

/// Typed body sink holding at most one decoded value.
#[derive(Debug)]
pub struct Slot<T>(Option<T>);

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self(None)
    }

    /// Take the decoded value, if a body has been decoded.
    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> BodySink for Slot<T> {
    fn decode(
        &mut self,
        de: &mut dyn erased_serde::Deserializer<'_>,
    ) -> Result<(), erased_serde::Error> {
        self.0 = Some(erased_serde::deserialize(de)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_decodes_typed_value() {
        let mut de = serde_json::Deserializer::from_str(r#"{"a":1}"#);
        let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
        let mut slot = Slot::<serde_json::Value>::new();
        slot.decode(&mut erased).unwrap();
        assert_eq!(slot.take(), Some(serde_json::json!({"a": 1})));
        assert!(slot.take().is_none());
    }

    #[test]
    fn slot_reports_type_mismatch() {
        let mut de = serde_json::Deserializer::from_str(r#""text""#);
        let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
        let mut slot = Slot::<u64>::new();
        assert!(slot.decode(&mut erased).is_err());
    }
}
