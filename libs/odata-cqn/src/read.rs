use cqn::{Column, Select};
use odata_core::ODataRequest;

use crate::expr::filter_to_tokens;
use crate::keys::key_predicate_to_where;
use crate::order_by::order_by_to_cqn;
use crate::pagination::page_limit;
use crate::select::select_to_cqn;
use crate::{Result, TranslationContext};

fn columns(request: &ODataRequest, ctx: &TranslationContext<'_>) -> Result<Option<Vec<Column>>> {
    match request.query.select.as_deref() {
        Some(raw) => select_to_cqn(raw, &ctx.entity.key_names(), ctx.entity),
        None => Ok(None),
    }
}

/// GET on a collection, a single entity, or `/$count`.
pub fn read_to_cqn(request: &ODataRequest, ctx: &TranslationContext<'_>) -> Result<Select> {
    let entity = ctx.entity;
    let query = &request.query;

    if let Some(keys) = &request.path.keys {
        return Ok(Select::new(&entity.name)
            .with_columns(columns(request, ctx)?)
            .with_where(key_predicate_to_where(keys, entity)?)
            .one());
    }

    let where_ = match query.filter() {
        Some(expr) => filter_to_tokens(expr, entity)?,
        None => Vec::new(),
    };

    if request.path.count {
        return Ok(Select::new(&entity.name).with_where(where_).to_count());
    }

    let limit = page_limit(
        query.top,
        query.skip,
        query.cursor_offset(),
        ctx.page_config(),
    );
    Ok(Select::new(&entity.name)
        .with_columns(columns(request, ctx)?)
        .with_where(where_)
        .with_order_by(order_by_to_cqn(&query.order, entity)?)
        .with_limit(limit))
}
