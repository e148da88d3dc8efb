//! Environment configuration, deserialized into [`Env`] with a small serde deserializer modelled
//! on the [`envy`] crate.
//!
//! Unlike [`envy`], field-level `rename` and `default` attributes behave as they do for any other
//! serde format.
//!
//! [`envy`]: https://github.com/softprops/envy

use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;
use serde::de::value::MapDeserializer;
use serde::de::{self, IntoDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

/// Loads (once) and returns the process configuration.
pub async fn config() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = config().await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::JwtSecret => &vars.jwt_secret,
        Var::InternalToken => &vars.internal_token,
        Var::ServerApiPort => &vars.server_api_port,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
    })
}

#[inline]
fn default_port() -> String {
    String::from("3000")
}

#[inline]
fn default_cors() -> String {
    String::from("*")
}

#[inline]
const fn default_sweep_interval() -> u64 {
    900
}

#[inline]
fn default_service_name() -> String {
    String::from("challenge-server")
}

#[inline]
fn default_tracer_name() -> String {
    String::from("challenge-server-tracer")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub database_url: String,
    pub jwt_secret: String,
    pub internal_token: String,
    #[serde(default = "default_port")]
    pub server_api_port: String,
    #[serde(default = "default_cors")]
    pub cors_allow_origins: String,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Empty disables OTLP export; logs still go to stdout
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: String,
    #[serde(default = "default_service_name")]
    pub api_service_name: String,
    #[serde(default = "default_tracer_name")]
    pub api_tracer_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(from_env::<Env>()?)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug)]
pub enum Var {
    DatabaseUrl,
    JwtSecret,
    InternalToken,
    ServerApiPort,
    CorsAllowOrigins,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

// ---
//  Deserializer implementation
// ---

struct Val(String, String);
struct Varname(String);

struct Deserializer<'de, Iter: Iterator<Item = (String, String)>> {
    inner: MapDeserializer<'de, Vars<Iter>, EnvDeserializeError>,
}

struct Vars<Iter>
where
    Iter: IntoIterator<Item = (String, String)>,
{
    inner: Iter,
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Val {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Varname {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<Iter: Iterator<Item = (String, String)>> Iterator for Vars<Iter> {
    type Item = (Varname, Val);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, v)| (Varname(k.clone()), Val(k, v)))
    }
}

impl<'de> serde::de::Deserializer<'de> for Val {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.1.into_deserializer().deserialize_any(visitor)
    }

    /// Intervals and other counters arrive as strings and are parsed here.
    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        match self.1.parse::<u64>() {
            Ok(val) => visitor.visit_u64(val),
            Err(e) => Err(de::Error::custom(format_args!(
                "{e}: while parsing '{}' (variable: {})",
                self.1, self.0
            ))),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

impl<'de> serde::de::Deserializer<'de> for Varname {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.0.into_deserializer().deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

impl<'de, Iter: Iterator<Item = (String, String)>> Deserializer<'de, Iter> {
    fn new(vars: Iter) -> Self {
        Deserializer {
            inner: MapDeserializer::new(Vars { inner: vars }),
        }
    }
}

impl<'de, Iter: Iterator<Item = (String, String)>> serde::de::Deserializer<'de>
    for Deserializer<'de, Iter>
{
    type Error = EnvDeserializeError;
    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.inner)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf
        newtype_struct unit_struct tuple_struct identifier
        tuple ignored_any bool u8 u16 u32 u64 i8 i16 i32 i64
        f32 f64 enum struct
    }
}

pub fn from_env<T>() -> Result<T, EnvDeserializeError>
where
    T: serde::de::DeserializeOwned,
{
    let vars = dotenvy::vars();
    from_iter(vars)
}

pub fn from_iter<Iter, T>(iter: Iter) -> Result<T, EnvDeserializeError>
where
    T: serde::de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    T::deserialize(Deserializer::new(iter.into_iter()))
}

impl serde::de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.into())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing environment variable: {0}")]
    MissingValue(String),
}
