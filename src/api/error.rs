use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Network or service reachability precondition failed.
    UnreachableService(String),
    /// Login was rejected or returned no usable token.
    InvalidCredentials(String),
    /// A cached bearer token was rejected.
    Unauthorized(String),
    ApiError(String),
    InvalidResponse(String, String),
    ConfigError(String),
    FormatError,
    InternalError,
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::UnreachableService(s) => {
                let error = format!("<html><body><h3>503 Service Unavailable</h3>GetFresh API not reachable: <code>{}</code></body></html>", s);
                Response::build()
                    .status(Status::ServiceUnavailable)
                    .sized_body(error.len(), Cursor::new(error))
                    .header(ContentType::new("text", "html"))
                    .ok()
            }
            Error::InvalidCredentials(s) | Error::Unauthorized(s) => {
                let error = format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to GetFresh API: <code>{}</code></body></html>", s);
                Response::build()
                    .status(Status::Forbidden)
                    .sized_body(error.len(), Cursor::new(error))
                    .header(ContentType::new("text", "html"))
                    .ok()
            }
            _ => {
                let error = format!(
                    "<html><body><h3>Unknown exception</h3><code>{:?}</code></body></html>",
                    self
                );
                Response::build()
                    .status(Status::InternalServerError)
                    .sized_body(error.len(), Cursor::new(error))
                    .header(ContentType::new("text", "html"))
                    .ok()
            }
        }
    }
}
