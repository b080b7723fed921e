use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type PgmResult<T> = Result<T, PgmError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Format,
    Schema,
    Invariant,
    Runtime,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

/// Errors raised by the factor-graph core.
///
/// `Format`/`Schema`/`Invariant`/`Runtime` correspond to the four fatal
/// failure kinds a load-and-run of a factor graph can hit: a malformed
/// record, a type/cardinality mismatch, a post-load safety-check failure,
/// and a runtime sampling fault (NaN score, bad weight lookup), in that
/// order.
#[derive(Debug)]
pub enum PgmError {
    Format {
        message: ErrString,
    },
    Schema {
        message: ErrString,
    },
    Invariant {
        message: ErrString,
    },
    Runtime {
        message: ErrString,
    },

    Multiple(MultiDisplay),

    Context {
        context: ErrorContext,
        source: Box<PgmError>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl PgmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Format { .. } => ErrorCode::Format,
            Self::Schema { .. } => ErrorCode::Schema,
            Self::Invariant { .. } => ErrorCode::Invariant,
            Self::Runtime { .. } => ErrorCode::Runtime,
            Self::Multiple(_) => ErrorCode::Context,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        PgmError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

impl Display for PgmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format { message } => write!(f, "Format error: {}", message),
            Self::Schema { message } => write!(f, "Schema error: {}", message),
            Self::Invariant { message } => write!(f, "Invariant error: {}", message),
            Self::Runtime { message } => write!(f, "Runtime error: {}", message),
            Self::Multiple(m) => write!(f, "Multiple errors:\n{}", m),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for PgmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

#[derive(Debug)]
pub struct MultiDisplay(Vec<PgmError>);

impl Display for MultiDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{}] {} (code: {:?})", i, e, e.code())?;
        }
        Ok(())
    }
}

impl From<Vec<PgmError>> for MultiDisplay {
    fn from(v: Vec<PgmError>) -> Self {
        Self(v)
    }
}

pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> PgmResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> PgmResult<T>;
}

impl<T, E: Into<PgmError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> PgmResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> PgmResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

pub trait IntoPgmError<T> {
    fn into_pgm_error(self) -> PgmResult<T>;
}

impl<T, E: Into<PgmError>> IntoPgmError<T> for Result<T, E> {
    fn into_pgm_error(self) -> PgmResult<T> {
        self.map_err(Into::into)
    }
}

#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! pgm_err {
    (Format: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::PgmError::Format { message: format!($fmt, $($arg),*).into() })
    };
    (Schema: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::PgmError::Schema { message: format!($fmt, $($arg),*).into() })
    };
    (Invariant: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::PgmError::Invariant { message: format!($fmt, $($arg),*).into() })
    };
    (Runtime: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::PgmError::Runtime { message: format!($fmt, $($arg),*).into() })
    };
    ($variant:ident: $msg:expr $(,)?) => {{
        $crate::__private::must_use($crate::PgmError::Runtime { message: $msg.into() })
    }};
}

#[macro_export]
macro_rules! pgm_bail {
    ($($tt:tt)+) => { return Err($crate::pgm_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::pgm_bail!($($tt)+); }
    };
}
