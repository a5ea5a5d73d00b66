use fieldkit_core::constants::entity_types;
use proptest::prelude::*;

/// One of the built-in entity type names
pub fn farm_entity_type_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(entity_types::ALL.to_vec())
}

/// Attribute names no built-in schema declares
pub fn unknown_attribute_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}_undeclared"
}

/// Entity type names nothing registers
pub fn unknown_entity_type_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,12}_unregistered"
}
