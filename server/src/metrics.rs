use anyhow::Result;
use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};
use log::{error, info};
use prometheus::{Encoder, TextEncoder};

use crate::register::Register;

struct PrometheusExporter {
    bind_address: String,
}

impl PrometheusExporter {
    fn new(register: &Register) -> Self {
        Self { bind_address: register.config.get_prometheus_exporter_bind_address() }
    }

    async fn run(self) {
        let addr = match self.bind_address.parse() {
            Ok(addr) => addr,
            Err(err) => {
                error!("invalid prometheus_exporter bind address {}: {err}", self.bind_address);
                return;
            }
        };

        info!("Prometheus exporter started on http://{addr}");

        let serve_future = Server::bind(&addr).serve(make_service_fn(|_| async {
            Ok::<_, hyper::Error>(service_fn(|_req| async {
                let encoder = TextEncoder::new();
                let metric_families = auction_engine::metrics::REGISTRY.gather();
                let mut buffer = vec![];
                encoder.encode(&metric_families, &mut buffer).unwrap();

                let response = Response::builder()
                    .status(200)
                    .header(CONTENT_TYPE, encoder.format_type())
                    .body(Body::from(buffer))
                    .unwrap();

                Ok::<_, hyper::Error>(response)
            }))
        }));

        if let Err(err) = serve_future.await {
            error!("Prometheus exporter server error: {err}");
        }
    }
}

#[derive(Clone)]
pub struct PrometheusExporterHandle {}

impl PrometheusExporterHandle {
    pub fn new(register: &Register) -> Result<Self> {
        let exporter = PrometheusExporter::new(register);
        tokio::spawn(async move { exporter.run().await });
        Ok(Self {})
    }
}
