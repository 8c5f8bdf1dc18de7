use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flood::http::{CaptureMode, ResponseParser};
use http::Method;
use std::fmt;

#[derive(Clone, Copy)]
enum Framing {
    ContentLength,
    Chunked,
}

struct Parameters {
    framing: Framing,
    body_size: usize,
    read_size: usize,
}

static PARAMETERS: [Parameters; 6] = [
    Parameters {
        framing: Framing::ContentLength,
        body_size: 512,
        read_size: 8192,
    },
    Parameters {
        framing: Framing::ContentLength,
        body_size: 64_000,
        read_size: 8192,
    },
    Parameters {
        framing: Framing::ContentLength,
        body_size: 64_000,
        read_size: 7,
    },
    Parameters {
        framing: Framing::Chunked,
        body_size: 512,
        read_size: 8192,
    },
    Parameters {
        framing: Framing::Chunked,
        body_size: 64_000,
        read_size: 8192,
    },
    Parameters {
        framing: Framing::Chunked,
        body_size: 64_000,
        read_size: 7,
    },
];

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let framing = match self.framing {
            Framing::ContentLength => "length",
            Framing::Chunked => "chunked",
        };
        write!(f, "{}|{}|{}", framing, self.body_size, self.read_size)
    }
}

fn response(param: &Parameters) -> Vec<u8> {
    let body = vec![b'a'; param.body_size];
    match param.framing {
        Framing::ContentLength => {
            let mut raw = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
            raw.extend_from_slice(&body);
            raw
        }
        Framing::Chunked => {
            let mut raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
            for chunk in body.chunks(1000) {
                raw.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                raw.extend_from_slice(chunk);
                raw.extend_from_slice(b"\r\n");
            }
            raw.extend_from_slice(b"0\r\n\r\n");
            raw
        }
    }
}

fn benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_parser");

    for param in &PARAMETERS {
        let raw = response(param);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(param), &raw, |b, raw| {
            b.iter(|| {
                let mut parser = ResponseParser::new(&Method::GET, CaptureMode::FirstChunk);
                for read in raw.chunks(param.read_size) {
                    parser.feed(read);
                }
                parser.into_response()
            })
        });
    }
}

criterion_group!(name = benches;
                 config = Criterion::default();
                 targets = benchmark);
criterion_main!(benches);
