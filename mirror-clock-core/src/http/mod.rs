//! The appliance's two HTTP routes, independent of any server crate.

pub mod multipart;
pub mod page;

pub use multipart::{boundary_from_content_type, MultipartError, MultipartUpload, UploadEvent};

use heapless::String;

pub const BODY_LEN: usize = 2048;
pub type Body = String<BODY_LEN>;

pub const STATUS_PATH: &str = "/";
pub const UPDATE_PATH: &str = "/update";
/// Form field that carries the firmware image.
pub const UPLOAD_FIELD: &str = "update";

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Sent with every response.
pub const RESPONSE_HEADERS: [(&str, &str); 2] = [
    ("Connection", "close"),
    ("Access-Control-Allow-Origin", "*"),
];

pub const UPDATE_OK_TEXT: &str = "Last update OK";
pub const UPDATE_FAIL_TEXT: &str = "Last update FAIL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            Method::Get
        } else if method.eq_ignore_ascii_case("POST") {
            Method::Post
        } else {
            Method::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    Status,
    UpdateQuery,
    UpdateUpload,
    NotFound,
}

/// Maps a request line onto a route. The query string is ignored.
pub fn route(method: Method, target: &str) -> Route {
    let path = target.split('?').next().unwrap_or(target);
    match (method, path) {
        (Method::Get, STATUS_PATH) => Route::Status,
        (Method::Get, UPDATE_PATH) => Route::UpdateQuery,
        (Method::Post, UPDATE_PATH) => Route::UpdateUpload,
        _ => Route::NotFound,
    }
}

/// What the transport does after sending a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    Keep,
    /// Flush the response, then call [`Device::restart`](crate::Device::restart).
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Body,
}

impl Response {
    pub fn html(body: Body) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_HTML,
            body,
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_TEXT,
            body: String::try_from(text).unwrap_or_default(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            ..Self::text("Not found")
        }
    }

    pub fn bad_request() -> Self {
        Self {
            status: 400,
            ..Self::text("Bad request")
        }
    }

    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &RESPONSE_HEADERS
    }
}
