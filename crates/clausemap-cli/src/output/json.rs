use clausemap_core::error::ClauseMapError;
use serde::Serialize;

pub fn print<T: Serialize>(value: &T) -> Result<(), ClauseMapError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
