use cds_model::PageConfig;
use cqn::Limit;
use odata_core::SkipToken;

fn clamp(rows: u64, max: Option<u64>) -> u64 {
    max.map_or(rows, |m| rows.min(m))
}

/// Effective page window for `$top` / `$skip` and the incoming cursor.
///
/// The cursor counts rows already delivered by earlier server-driven pages
/// and is added to the offset, saturating at `u64::MAX`. With `$top` and a
/// cursor, only the rows of `$top` not yet delivered are requested; when
/// nothing would remain the original `$top` is kept. Rows never exceed
/// `max_page_size`.
pub fn page_limit(top: Option<u64>, skip: Option<u64>, cursor: u64, cfg: PageConfig) -> Limit {
    let offset = skip.unwrap_or(0).saturating_add(cursor);
    let rows = match top {
        Some(top) if cursor > 0 => {
            let remaining = top.saturating_sub(cursor);
            let rows = if remaining == 0 { top } else { remaining };
            Some(clamp(rows, cfg.max_page_size))
        }
        Some(top) => Some(clamp(top, cfg.max_page_size)),
        None => match (cfg.default_page_size, cfg.max_page_size) {
            (Some(default), max) => Some(clamp(default, max)),
            (None, max) => max,
        },
    };
    Limit::new(rows, offset)
}

/// Skip token for the next server-driven page, if there is one.
///
/// A next page exists when the page came back full and the row count was
/// imposed by the server rather than by what the client still asked for.
pub fn next_skip_token(
    top: Option<u64>,
    cursor: u64,
    limit: &Limit,
    delivered: usize,
) -> Option<SkipToken> {
    let rows = limit.rows?;
    let delivered = delivered as u64;
    if rows == 0 || delivered < rows {
        return None;
    }
    if let Some(top) = top {
        if top.saturating_sub(cursor) <= rows {
            return None;
        }
    }
    Some(SkipToken::new(cursor.saturating_add(delivered)))
}
