use std::{env, fmt::Debug, str::FromStr};

/// Reads `name` from the environment, falling back to `default` when the
/// variable is missing or does not parse.
pub fn read_env_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Debug,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid value {:?} for {}, using {:?}", raw, name, default);
                default
            }
        },
        Err(_) => default,
    }
}
