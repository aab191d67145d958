//! Transaction error types.

use crate::events::bus::ListenerError;
use crate::events::channel::EventChannel;
use crate::model::record::{RecordId, RESERVED_ID_FIELD};
use crate::txn::handle::Verb;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TransactionResult<T> = Result<T, TransactionError>;

#[derive(Debug)]
pub enum TransactionError {
    /// Input record at `index` already carries the reserved identity field.
    ReservedField { index: usize },
    /// Identity is not tracked by this context.
    UnknownRecord(RecordId),
    /// A listener failed while a verb was dispatching its event.
    ///
    /// State changes made by the verb before dispatch are kept.
    Listener {
        channel: EventChannel,
        id: RecordId,
        index: usize,
        source: ListenerError,
    },
    /// Verb cannot be invoked without arguments.
    VerbNeedsArguments(Verb),
}

impl Display for TransactionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReservedField { index } => write!(
                f,
                "record at index {index} must not contain reserved field `{RESERVED_ID_FIELD}`"
            ),
            Self::UnknownRecord(id) => write!(f, "record not tracked by this context: {id}"),
            Self::Listener {
                channel,
                id,
                index,
                source,
            } => write!(
                f,
                "{channel} listener #{index} failed for record {id}: {source}"
            ),
            Self::VerbNeedsArguments(verb) => {
                write!(f, "verb `{}` requires arguments", verb.as_str())
            }
        }
    }
}

impl Error for TransactionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Listener { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
