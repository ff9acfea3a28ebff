//! Session-loop benchmarks (SPEC_FULL.md §8): measures one full session
//! round trip (connect, hello, one command, response, close) against a
//! local loopback stub server, and the subprocess executor's per-exec
//! overhead in isolation.
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench daemon
//! ```

use criterion::{Criterion, criterion_group, criterion_main};
use outpost::config::{Tool, ToolConfig};
use outpost::exec::RealSubprocessRunner;
use outpost::logger::Logger;
use outpost::protocol::CMD_SLEEP;
use outpost::session::SessionController;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;

fn bench_session_round_trip(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let logger = Logger::open(&dir.path().join("log")).unwrap();
    let runner = RealSubprocessRunner;
    let tool = Tool {
        name: *b"BNCH",
        config: ToolConfig {
            ip: "127.0.0.1".to_string(),
            port: 0,
            default_sleep_secs: 30,
        },
    };

    c.bench_function("session_sleep_round_trip", |b| {
        b.iter(|| {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let server = std::thread::spawn(move || {
                let (mut stream, _) = listener.accept().unwrap();
                let mut hello = [0u8; 5];
                stream.read_exact(&mut hello).unwrap();

                let mut cmd = vec![CMD_SLEEP];
                cmd.extend_from_slice(&4u32.to_be_bytes());
                cmd.extend_from_slice(&0u32.to_be_bytes());
                stream.write_all(&cmd).unwrap();

                let mut resp = [0u8; 8];
                let _ = stream.read_exact(&mut resp);
            });

            let controller = SessionController::new(&tool, &logger, &runner);
            let stream = TcpStream::connect(addr).unwrap();
            let _ = controller.run(stream);
            server.join().unwrap();
        })
    });
}

fn bench_exec_true(c: &mut Criterion) {
    c.bench_function("exec_bin_true", |b| {
        b.iter(|| {
            let outcome = outpost::exec::run(Path::new("/bin/true"), &["true".to_string()], 1000).unwrap();
            assert_eq!(outcome.exit_code, 0);
        })
    });
}

criterion_group!(benches, bench_session_round_trip, bench_exec_true);
criterion_main!(benches);
