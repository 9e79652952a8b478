use embassy_time::Instant;
use mirror_clock_common::*;
use mirror_clock_core::http::{
    self, boundary_from_content_type, Method, MultipartUpload, Route, UploadEvent,
};
use mirror_clock_core::{Device, Disposition, RequestSource, Response};

use crate::SimulatorPlatform;

/// One TCP segment worth of body per read.
const READ_CHUNK: usize = 1460;

/// `POST /update` whose body is still being read.
struct InFlightUpload {
    request: tiny_http::Request,
    parser: MultipartUpload,
    /// The file part reached the device.
    started: bool,
}

/// Non-blocking HTTP front end, polled once per main loop tick.
///
/// An upload body is read one chunk per tick, so the periodic tasks and the
/// watchdog keep running while it streams in.
pub struct HttpServer {
    server: tiny_http::Server,
    upload: Option<InFlightUpload>,
}

impl HttpServer {
    pub fn bind(addr: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let server = Self {
            server: tiny_http::Server::http(addr)?,
            upload: None,
        };
        match server.local_addr() {
            Some(bound) => info!("[Simulator HTTP] Listening on http://{}", bound),
            None => info!("[Simulator HTTP] Listening on {}", addr),
        }
        Ok(server)
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn upload_in_flight(&self) -> bool {
        self.upload.is_some()
    }

    fn accept_upload(&mut self, request: tiny_http::Request) {
        let content_type = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Content-Type"))
            .map(|h| h.value.as_str().to_owned())
            .unwrap_or_default();

        let parser = boundary_from_content_type(&content_type)
            .ok_or(http::MultipartError::MissingBoundary)
            .and_then(MultipartUpload::new);
        match parser {
            Ok(parser) => {
                self.upload = Some(InFlightUpload {
                    request,
                    parser,
                    started: false,
                });
            }
            Err(e) => {
                warn!("[Simulator HTTP] Rejecting upload: {}", e);
                respond(request, Response::bad_request());
            }
        }
    }
}

fn deliver(device: &mut Device<SimulatorPlatform>, started: &mut bool, event: UploadEvent<'_>) {
    if matches!(event, UploadEvent::Start { .. }) {
        *started = true;
    }
    device.handle_upload(event, Instant::now());
}

/// Reads one chunk of the body. Gives the upload back while more is expected.
fn continue_upload(
    mut upload: InFlightUpload,
    device: &mut Device<SimulatorPlatform>,
) -> Option<InFlightUpload> {
    let mut buf = [0u8; READ_CHUNK];
    let mut started = upload.started;

    let more = match upload.request.as_reader().read(&mut buf) {
        Ok(0) => false,
        Ok(n) => {
            let fed = upload
                .parser
                .feed(&buf[..n], &mut |e| deliver(device, &mut started, e));
            match fed {
                Ok(()) => !upload.parser.is_complete(),
                Err(e) => {
                    warn!("[Simulator HTTP] Malformed upload: {}", e);
                    false
                }
            }
        }
        Err(e) => {
            warn!("[Simulator HTTP] Upload interrupted: {}", e);
            false
        }
    };

    // A finished session ignores the rest of the body; answer right away.
    let settled = started && device.update_stage().is_terminal();
    if more && !settled {
        upload.started = started;
        return Some(upload);
    }

    upload
        .parser
        .finish(&mut |e| deliver(device, &mut started, e));
    let (response, disposition) = device.finish_upload(Instant::now());
    respond(upload.request, response);

    if disposition == Disposition::Restart {
        device.restart(Instant::now());
    }
    None
}

impl RequestSource<SimulatorPlatform> for HttpServer {
    fn service(&mut self, device: &mut Device<SimulatorPlatform>, now: Instant) {
        if let Some(upload) = self.upload.take() {
            self.upload = continue_upload(upload, device);
            return;
        }

        let request = match self.server.try_recv() {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                warn!("[Simulator HTTP] Accept failed: {}", e);
                return;
            }
        };

        let method = Method::parse(request.method().as_str());
        debug!("[Simulator HTTP] {} {}", request.method(), request.url());

        match http::route(method, request.url()) {
            Route::Status => {
                let response = device.handle_status_request(now);
                respond(request, response);
            }
            Route::UpdateQuery => respond(request, device.handle_update_query()),
            Route::UpdateUpload => self.accept_upload(request),
            Route::NotFound => respond(request, Response::not_found()),
        }
    }
}

fn respond(request: tiny_http::Request, response: Response) {
    let mut reply = tiny_http::Response::from_string(response.body.as_str())
        .with_status_code(response.status);

    let content_type = [("Content-Type", response.content_type)];
    for (field, value) in response.headers().iter().chain(content_type.iter()) {
        if let Ok(header) = tiny_http::Header::from_bytes(field.as_bytes(), value.as_bytes()) {
            reply.add_header(header);
        }
    }

    if let Err(e) = request.respond(reply) {
        warn!("[Simulator HTTP] Failed to send response: {}", e);
    }
}
