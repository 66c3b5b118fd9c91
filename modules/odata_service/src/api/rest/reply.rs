//! Request execution shared by the v4 handlers and the v2 proxy: parse,
//! translate, execute, and hand back a protocol-neutral [`Reply`].

use axum::body::Bytes;
use axum::http::Method;
use cds_auth::User;
use cds_model::{Entity, Model};
use cqn::{DataValue, Query, Select};
use odata_core::{KeyPredicate, ODataRequest, QueryParams, ResourcePath, SkipToken};
use odata_cqn::{
    decode_binaries, encode_binaries, filter_payload, next_skip_token, odata_to_cqn, OperationKind,
    TranslationContext,
};
use serde_json::Value as Json;
use tracing::info;

use crate::actions::ActionCall;
use crate::error::ApiError;
use crate::executor::ExecResult;
use crate::state::AppState;

pub(crate) struct Call<'a> {
    pub service: &'a str,
    pub raw_path: &'a str,
    pub params: &'a QueryParams,
    pub method: &'a Method,
    pub body: &'a Bytes,
    pub user: &'a User,
}

pub(crate) enum Reply {
    Collection {
        set: String,
        rows: Vec<Json>,
        count: Option<u64>,
        next: Option<SkipToken>,
    },
    Entity {
        set: String,
        row: Json,
    },
    /// `location` is the entity's address relative to the service root.
    Created {
        set: String,
        location: String,
        row: Json,
    },
    Count(u64),
    Value(Json),
    NoContent,
}

/// Entity sets a service exposes, in model order.
pub(crate) fn entity_sets<'a>(model: &'a Model, service: &'a str) -> Vec<&'a str> {
    model.service_entities(service).map(Entity::short_name).collect()
}

/// `path?query` with the `$skiptoken` of the next page in place of any
/// incoming one.
pub(crate) fn next_link(path: &str, raw_query: Option<&str>, token: &SkipToken) -> String {
    let token = format!("$skiptoken={}", token.encode());
    let mut pairs: Vec<&str> = raw_query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("$skiptoken=") && !p.starts_with("%24skiptoken="))
        .collect();
    pairs.push(&token);
    format!("{}?{}", path, pairs.join("&"))
}

fn literal(value: &Json) -> String {
    match value {
        Json::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

/// `Set(1)` for single-key entities, `Set(ID=1,IsActiveEntity=true)` otherwise.
fn key_segment(entity: &Entity, row: &Json) -> String {
    let keys: Vec<(&str, String)> = entity
        .keys()
        .map(|k| (k.name.as_str(), literal(row.get(&k.name).unwrap_or(&Json::Null))))
        .collect();
    let inner = match keys.as_slice() {
        [(_, value)] => value.clone(),
        many => many
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
    };
    format!("{}({})", entity.short_name(), inner)
}

fn describe_keys(keys: Option<&KeyPredicate>) -> String {
    match keys {
        Some(KeyPredicate::Single(v)) => v.to_string(),
        Some(KeyPredicate::Named(pairs)) => pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
        None => String::new(),
    }
}

fn not_found(entity: &Entity, path: &ResourcePath) -> ApiError {
    ApiError::EntityNotFound {
        entity: entity.short_name().to_string(),
        key: describe_keys(path.keys.as_ref()),
    }
}

fn operation_kind(method: &Method, path: &ResourcePath) -> Result<OperationKind, ApiError> {
    let plain = path.operation.is_none() && !path.count;
    let kind = match *method {
        Method::GET if path.operation.is_some() => OperationKind::BoundAction,
        Method::GET => OperationKind::Read,
        Method::POST if path.operation.is_some() => OperationKind::BoundAction,
        Method::POST if plain && path.is_collection() => OperationKind::Create,
        Method::PATCH | Method::PUT if plain => OperationKind::Update,
        Method::DELETE if plain => OperationKind::Delete,
        _ => {
            return Err(ApiError::MethodNotAllowed {
                method: method.clone(),
                target: path.entity_set.clone(),
            })
        }
    };
    Ok(kind)
}

fn parse_body(body: &Bytes) -> Result<Option<Json>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::InvalidBody(e.to_string()))
}

/// Inbound payload: base64 binaries decoded, undeclared members dropped.
fn inbound(body: &Bytes, entity: &Entity, model: &Model) -> Result<Option<DataValue>, ApiError> {
    let Some(json) = parse_body(body)? else {
        return Ok(None);
    };
    let mut data = DataValue::from(json);
    decode_binaries(&mut data, entity, model)?;
    Ok(Some(filter_payload(&data, entity, model)))
}

fn outbound(mut row: DataValue, entity: &Entity, model: &Model) -> Json {
    encode_binaries(&mut row, entity, model);
    row.to_json()
}

async fn count(state: &AppState, select: &Select) -> Result<u64, ApiError> {
    match state.executor.execute(&Query::Select(select.to_count())).await? {
        ExecResult::Count(n) => Ok(n),
        other => Err(ApiError::Internal(anyhow::anyhow!(
            "count query returned {:?}",
            other
        ))),
    }
}

pub(crate) async fn execute(state: &AppState, call: Call<'_>) -> Result<Reply, ApiError> {
    let model = state.model.as_ref();
    let service = state
        .service(call.service)
        .ok_or_else(|| ApiError::ServiceNotFound(call.service.to_string()))?;
    let request = ODataRequest::parse(call.raw_path, call.params)?;
    let set = request.path.entity_set.clone();
    let entity = model
        .entity_in(call.service, &set)
        .ok_or_else(|| ApiError::EntitySetNotFound {
            service: call.service.to_string(),
            set: set.clone(),
        })?;
    let ctx = TranslationContext::new(model, entity)
        .with_service(service)
        .with_defaults(state.settings.page_defaults);
    let kind = operation_kind(call.method, &request.path)?;
    info!(service = call.service, entity = %entity.name, operation = %kind, user = %call.user.id, "handling request");

    let data = match kind {
        OperationKind::BoundAction => return invoke(state, &request, &ctx, &call).await,
        OperationKind::Create | OperationKind::Update => inbound(call.body, entity, model)?,
        OperationKind::Read | OperationKind::Delete => None,
    };
    let query = odata_to_cqn(kind, &request, data.as_ref(), &ctx)?;
    let result = state.executor.execute(&query).await?;

    match kind {
        OperationKind::Read if request.path.count => match result {
            ExecResult::Count(n) => Ok(Reply::Count(n)),
            other => Err(ApiError::Internal(anyhow::anyhow!(
                "$count returned {:?}",
                other
            ))),
        },
        OperationKind::Read if !request.path.is_collection() => {
            let row = result
                .into_rows()
                .into_iter()
                .next()
                .ok_or_else(|| not_found(entity, &request.path))?;
            Ok(Reply::Entity {
                set,
                row: outbound(row, entity, model),
            })
        }
        OperationKind::Read => {
            let rows: Vec<Json> = result
                .into_rows()
                .into_iter()
                .map(|row| outbound(row, entity, model))
                .collect();
            let (total, next) = match query.as_select() {
                Some(select) => {
                    let total = if request.query.count {
                        Some(count(state, select).await?)
                    } else {
                        None
                    };
                    let next = select.limit.as_ref().and_then(|limit| {
                        next_skip_token(
                            request.query.top,
                            request.query.cursor_offset(),
                            limit,
                            rows.len(),
                        )
                    });
                    (total, next)
                }
                None => (None, None),
            };
            Ok(Reply::Collection {
                set,
                rows,
                count: total,
                next,
            })
        }
        OperationKind::Create => {
            let row = result
                .into_rows()
                .into_iter()
                .next()
                .map(|row| outbound(row, entity, model))
                .unwrap_or(Json::Null);
            Ok(Reply::Created {
                location: key_segment(entity, &row),
                set,
                row,
            })
        }
        OperationKind::Update => {
            let row = result
                .into_rows()
                .into_iter()
                .next()
                .ok_or_else(|| not_found(entity, &request.path))?;
            Ok(Reply::Entity {
                set,
                row: outbound(row, entity, model),
            })
        }
        OperationKind::Delete | OperationKind::BoundAction => match result {
            ExecResult::Affected(0) => Err(not_found(entity, &request.path)),
            _ => Ok(Reply::NoContent),
        },
    }
}

async fn invoke(
    state: &AppState,
    request: &ODataRequest,
    ctx: &TranslationContext<'_>,
    call: &Call<'_>,
) -> Result<Reply, ApiError> {
    let entity = ctx.entity;
    let action = request.path.operation_name().unwrap_or_default();
    let handler = state
        .actions
        .get(&entity.name, action)
        .ok_or_else(|| ApiError::ActionNotFound {
            entity: entity.short_name().to_string(),
            action: action.to_string(),
        })?;

    let params = parse_body(call.body)?
        .map(DataValue::from)
        .unwrap_or_default();
    let query = odata_to_cqn(OperationKind::BoundAction, request, None, ctx)?;
    let instances = state.executor.execute(&query).await?.into_rows();
    if request.path.keys.is_some() && instances.is_empty() {
        return Err(not_found(entity, &request.path));
    }

    let out = handler(ActionCall {
        service: call.service,
        entity,
        action,
        instances: &instances,
        params: &params,
        user: call.user,
    })
    .map_err(|source| ApiError::Action {
        action: action.to_string(),
        source,
    })?;

    match out {
        DataValue::Null => Ok(Reply::NoContent),
        value => Ok(Reply::Value(outbound(value, entity, ctx.model))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cds_model::{CdsType, Element};
    use serde_json::json;

    #[test]
    fn next_link_replaces_the_incoming_token() {
        let token = SkipToken::new(40);
        let link = next_link(
            "/odata/v4/CatalogService/Books",
            Some("$top=100&$skiptoken=abc&$select=title"),
            &token,
        );
        assert_eq!(
            link,
            format!(
                "/odata/v4/CatalogService/Books?$top=100&$select=title&$skiptoken={}",
                token.encode()
            )
        );
        let link = next_link("/v2/S/Books", None, &token);
        assert!(link.starts_with("/v2/S/Books?$skiptoken="));
    }

    #[test]
    fn key_segments() {
        let books = Entity::new("S.Books").with_element(Element::primitive("ID", CdsType::Integer).key());
        assert_eq!(key_segment(&books, &json!({"ID": 7, "title": "x"})), "Books(7)");

        let drafts = Entity::new("S.Orders")
            .with_element(Element::primitive("ID", CdsType::String).key())
            .with_element(Element::primitive("IsActiveEntity", CdsType::Boolean).key());
        assert_eq!(
            key_segment(&drafts, &json!({"ID": "o'1", "IsActiveEntity": true})),
            "Orders(ID='o''1',IsActiveEntity=true)"
        );
    }

    #[test]
    fn methods_map_to_operations() {
        let collection = ResourcePath::entity_set("Books");
        let single = ResourcePath::entity_set("Books").with_keys(KeyPredicate::Single(
            odata_core::ast::Value::String("x".into()),
        ));
        let action = single.clone().with_operation("S.submit");

        assert_eq!(operation_kind(&Method::GET, &collection).unwrap(), OperationKind::Read);
        assert_eq!(operation_kind(&Method::POST, &collection).unwrap(), OperationKind::Create);
        assert_eq!(operation_kind(&Method::PATCH, &single).unwrap(), OperationKind::Update);
        assert_eq!(operation_kind(&Method::PUT, &single).unwrap(), OperationKind::Update);
        assert_eq!(operation_kind(&Method::DELETE, &single).unwrap(), OperationKind::Delete);
        assert_eq!(operation_kind(&Method::POST, &action).unwrap(), OperationKind::BoundAction);
        assert!(operation_kind(&Method::POST, &single).is_err());
        assert!(operation_kind(&Method::HEAD, &collection).is_err());
    }
}
