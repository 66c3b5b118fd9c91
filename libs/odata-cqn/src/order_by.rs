use cds_model::{is_draft_column, Entity};
use cqn::{OrderBy, Sort, Token};
use odata_core::ast::Expr;
use odata_core::{ODataOrderBy, SortDir};

use crate::expr::{operand, resolve_path};
use crate::{Error, Result};

fn sort_of(dir: SortDir) -> Sort {
    match dir {
        SortDir::Asc => Sort::Asc,
        SortDir::Desc => Sort::Desc,
    }
}

/// Default order of an entity: declared annotations, else its non-draft keys
/// ascending.
pub fn default_order(entity: &Entity) -> Vec<OrderBy> {
    let declared = entity.default_order();
    if !declared.is_empty() {
        return declared
            .into_iter()
            .map(|d| OrderBy::column(d.column, if d.desc { Sort::Desc } else { Sort::Asc }))
            .collect();
    }
    entity
        .keys()
        .filter(|k| !is_draft_column(&k.name))
        .map(|k| OrderBy::column(k.name.clone(), Sort::Asc))
        .collect()
}

/// Translate `$orderby` and append the entity's default order for columns
/// the client did not order by explicitly.
pub fn order_by_to_cqn(order: &ODataOrderBy, entity: &Entity) -> Result<Vec<OrderBy>> {
    let mut out = Vec::with_capacity(order.len());
    for item in order.iter() {
        let expr = match &item.expr {
            Expr::Identifier(path) => Token::reference(resolve_path(path, entity)?),
            computed @ Expr::Function(..) => operand(computed, entity)?,
            other => {
                return Err(Error::NotSupported {
                    option: "$orderby",
                    kind: other.kind(),
                })
            }
        };
        out.push(OrderBy::new(expr, sort_of(item.dir)));
    }

    for fallback in default_order(entity) {
        let covered = out
            .iter()
            .any(|o| o.as_column().is_some() && o.as_column() == fallback.as_column());
        if !covered {
            out.push(fallback);
        }
    }
    Ok(out)
}
