use rocket::http::Status;
use rocket::Request;

use crate::resp::jwt::AuthFailure;
use crate::resp::problem::{problems, Problem};

/// Renders every framework error as a problem document.
#[catch(default)]
pub fn default_catcher(status: Status, req: &Request<'_>) -> Problem {
    if status == Status::Unauthorized {
        if let AuthFailure(Some(problem)) = req.local_cache(AuthFailure::default) {
            return problem.clone();
        }
    }

    match status.code {
        // malformed bodies and path parameters are plain validation errors
        400 | 422 => problems::parse_problem(),
        404 => Problem::new_untyped(Status::NotFound, "Not found.")
            .detail(format!("No resource at '{}'", req.uri().path()))
            .instance_uri(req.uri().path().to_string())
            .to_owned(),
        413 => Problem::new_untyped(Status::PayloadTooLarge, "Payload too large.")
            .detail("Request body exceeds the size limit")
            .to_owned(),
        _ => problems::from_status(status),
    }
}
