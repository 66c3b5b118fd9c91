use std::fmt;
use std::str::FromStr;

use cqn::{DataValue, Query};
use odata_core::ODataRequest;

use crate::action::bound_action_to_cqn;
use crate::read::read_to_cqn;
use crate::write::{create_to_cqn, delete_to_cqn, update_to_cqn};
use crate::{Error, Result, TranslationContext};

/// Request-handler kinds the dispatcher knows how to translate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
    BoundAction,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::BoundAction => "bound-action",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "read" => Ok(OperationKind::Read),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            "bound-action" | "boundaction" | "action" => Ok(OperationKind::BoundAction),
            _ => Err(Error::UnknownOperation(s.to_string())),
        }
    }
}

fn payload(data: Option<&DataValue>) -> Result<&DataValue> {
    data.ok_or_else(|| Error::InvalidPayload("request body is required".into()))
}

/// Translate one OData request into exactly one CQN query.
pub fn odata_to_cqn(
    kind: OperationKind,
    request: &ODataRequest,
    data: Option<&DataValue>,
    ctx: &TranslationContext<'_>,
) -> Result<Query> {
    let query: Query = match kind {
        OperationKind::Create => create_to_cqn(payload(data)?, ctx)?.into(),
        OperationKind::Read => read_to_cqn(request, ctx)?.into(),
        OperationKind::Update => update_to_cqn(request, payload(data)?, ctx)?.into(),
        OperationKind::Delete => delete_to_cqn(request, ctx)?.into(),
        OperationKind::BoundAction => bound_action_to_cqn(request, ctx)?.into(),
    };
    tracing::trace!(operation = %kind, entity = %ctx.entity.name, verb = query.kind(), "translated request");
    Ok(query)
}
