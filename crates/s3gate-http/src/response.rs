//! Gateway-generated responses: S3 `<Error>` documents and the health check.

use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::body::GatewayBody;
use crate::error::{GatewayError, GatewayErrorCode};

/// Format an S3 error document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>AccessDenied</Code>
///   <Message>Access Denied</Message>
///   <Resource>/mybucket</Resource>
///   <RequestId>4442587FB7D0A2F9</RequestId>
/// </Error>
/// ```
#[must_use]
pub fn error_to_xml(code: &str, message: &str, resource: Option<&str>, request_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, code, message, resource, request_id) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(code))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(message))?;
        if let Some(res) = resource {
            w.create_element("Resource")
                .write_text_content(BytesText::new(res))?;
        }
        w.create_element("RequestId")
            .write_text_content(BytesText::new(request_id))?;
        Ok(())
    })?;

    Ok(())
}

/// Render a [`GatewayError`] as an XML response.
#[must_use]
pub fn error_to_response(err: &GatewayError, request_id: &str) -> http::Response<GatewayBody> {
    let xml = error_to_xml(
        err.code.as_str(),
        &err.message,
        err.resource.as_deref(),
        request_id,
    );

    http::Response::builder()
        .status(err.status_code())
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(GatewayBody::from_bytes(xml))
        .unwrap_or_else(|_| {
            http::Response::builder()
                .status(GatewayErrorCode::InternalError.default_status_code())
                .body(GatewayBody::empty())
                .expect("static response should be valid")
        })
}

/// Whether the request targets the gateway's own health endpoint.
#[must_use]
pub fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == "/_health"
}

/// The health check response.
#[must_use]
pub fn health_check_response() -> http::Response<GatewayBody> {
    let body = concat!(r#"{"status":"running","service":"s3gate","version":""#, env!("CARGO_PKG_VERSION"), r#""}"#);
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(GatewayBody::from_bytes(body))
        .expect("static health response should be valid")
}
