//! SimpleStorage: one favourite number plus a list of people.

use super::{
    method_name, string_arg, uint_arg, uint_value, CallContext, Emitted, Outcome,
    SimulatedContract,
};
use primitive_types::U256;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SimpleStorage {
    favorite_number: U256,
    people: Vec<(String, U256)>,
    name_to_favorite_number: HashMap<String, U256>,
}

impl SimpleStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimulatedContract for SimpleStorage {
    fn name(&self) -> &'static str {
        "SimpleStorage"
    }

    fn execute(&mut self, ctx: &CallContext, method: &str, args: &[Value]) -> Outcome {
        match method_name(method) {
            "store" => match uint_arg(args, 0) {
                Ok(value) => {
                    self.favorite_number = value;
                    Outcome::emit(
                        Emitted::new("ValueStored")
                            .arg("sender", json!(ctx.sender.to_string()))
                            .arg("value", uint_value(value)),
                    )
                }
                Err(reason) => Outcome::revert(reason),
            },
            "addPerson" => {
                let person = string_arg(args, 0).and_then(|name| Ok((name, uint_arg(args, 1)?)));
                match person {
                    Ok((name, number)) => {
                        self.name_to_favorite_number.insert(name.clone(), number);
                        self.people.push((name, number));
                        Outcome::ok()
                    }
                    Err(reason) => Outcome::revert(reason),
                }
            }
            other => Outcome::revert(format!("SimpleStorage has no method {other}")),
        }
    }

    fn query(&self, _ctx: &CallContext, method: &str, args: &[Value]) -> Result<Value, String> {
        match method_name(method) {
            "retrieve" => Ok(uint_value(self.favorite_number)),
            "people" => {
                let index = uint_arg(args, 0)?;
                let (name, number) = (index < U256::from(self.people.len()))
                    .then(|| &self.people[index.low_u64() as usize])
                    .ok_or("index out of bounds")?;
                Ok(json!({ "name": name, "favoriteNumber": uint_value(*number) }))
            }
            "nameToFavoriteNumber" => {
                let name = string_arg(args, 0)?;
                Ok(uint_value(
                    self.name_to_favorite_number
                        .get(&name)
                        .copied()
                        .unwrap_or_default(),
                ))
            }
            other => Err(format!("SimpleStorage has no view {other}")),
        }
    }

    fn snapshot(&self) -> Box<dyn SimulatedContract> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Address;

    fn ctx() -> CallContext {
        CallContext {
            sender: Address::ZERO,
            value: U256::zero(),
            balance: U256::zero(),
            block_number: 1,
            timestamp: 0,
            contract: Address::ZERO,
        }
    }

    #[test]
    fn test_store_and_retrieve() {
        let mut storage = SimpleStorage::new();
        assert_eq!(storage.query(&ctx(), "retrieve", &[]).unwrap(), json!("0x0"));

        let outcome = storage.execute(&ctx(), "store(uint256)", &[json!(7)]);
        let Outcome::Success { emitted, .. } = outcome else {
            panic!("store reverted");
        };
        assert_eq!(emitted[0].event, "ValueStored");
        assert_eq!(storage.query(&ctx(), "retrieve()", &[]).unwrap(), json!("0x7"));
    }

    #[test]
    fn test_people() {
        let mut storage = SimpleStorage::new();
        storage.execute(&ctx(), "addPerson", &[json!("Patrick"), json!(16)]);

        assert_eq!(
            storage.query(&ctx(), "nameToFavoriteNumber", &[json!("Patrick")]).unwrap(),
            json!("0x10")
        );
        assert_eq!(storage.query(&ctx(), "people", &[json!(0)]).unwrap()["name"], "Patrick");
        assert!(storage.query(&ctx(), "people", &[json!(1)]).is_err());
    }

    #[test]
    fn test_bad_argument_reverts() {
        let mut storage = SimpleStorage::new();
        assert!(matches!(
            storage.execute(&ctx(), "store", &[json!("seven")]),
            Outcome::Revert(_)
        ));
    }
}
