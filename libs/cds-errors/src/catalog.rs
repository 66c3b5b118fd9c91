use http::StatusCode;

use crate::problem::Problem;

/// Static error definition from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub type_url: &'static str,
}

impl ErrDef {
    /// Convert this error definition into a Problem with the given detail
    #[inline]
    pub fn to_problem(&self, detail: impl Into<String>) -> Problem {
        Problem::new(
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            self.title,
            detail.into(),
        )
        .with_code(self.code)
        .with_type(self.type_url)
    }
}

macro_rules! err_def {
    ($name:ident, $status:expr, $title:expr) => {
        pub const $name: ErrDef = ErrDef {
            status: $status,
            title: $title,
            code: stringify!($name),
            type_url: concat!("https://errors.cds-odata.dev/", stringify!($name)),
        };
    };
}

err_def!(ODATA_INVALID_QUERY, 400, "Invalid Query Option");
err_def!(ODATA_INVALID_PATH, 400, "Invalid Resource Path");
err_def!(ODATA_INVALID_KEY, 400, "Invalid Key Predicate");
err_def!(ODATA_INVALID_PAYLOAD, 400, "Invalid Payload");
err_def!(ODATA_UNKNOWN_PROPERTY, 400, "Unknown Property");
err_def!(ODATA_NOT_SUPPORTED, 501, "Feature Not Supported");
err_def!(SERVICE_NOT_FOUND, 404, "Service Not Found");
err_def!(ENTITY_SET_NOT_FOUND, 404, "Entity Set Not Found");
err_def!(ENTITY_NOT_FOUND, 404, "Entity Not Found");
err_def!(ENTITY_CONFLICT, 409, "Entity Already Exists");
err_def!(ACTION_NOT_FOUND, 404, "Action Not Found");
err_def!(ACTION_FAILED, 400, "Action Failed");
err_def!(METHOD_NOT_ALLOWED, 405, "Method Not Allowed");
err_def!(UNAUTHORIZED, 401, "Unauthorized");
err_def!(FORBIDDEN, 403, "Forbidden");
err_def!(INTERNAL, 500, "Internal Server Error");

/// Every catalog entry, for documentation and uniqueness checks.
pub const ALL: &[ErrDef] = &[
    ODATA_INVALID_QUERY,
    ODATA_INVALID_PATH,
    ODATA_INVALID_KEY,
    ODATA_INVALID_PAYLOAD,
    ODATA_UNKNOWN_PROPERTY,
    ODATA_NOT_SUPPORTED,
    SERVICE_NOT_FOUND,
    ENTITY_SET_NOT_FOUND,
    ENTITY_NOT_FOUND,
    ENTITY_CONFLICT,
    ACTION_NOT_FOUND,
    ACTION_FAILED,
    METHOD_NOT_ALLOWED,
    UNAUTHORIZED,
    FORBIDDEN,
    INTERNAL,
];
