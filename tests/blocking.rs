use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use fungen::blocking::{FunctionGenerator, Session};
use fungen::{Function, ProtoError, SessionOptions, UploadOptions, Waveform};

fn serve(replies: &'static [(&'static str, &'static str)]) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!(
        "TCPIP::127.0.0.1::{}::SOCKET",
        listener.local_addr().unwrap().port()
    );
    let handle = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        let mut writer = socket.try_clone().unwrap();
        let mut received = Vec::new();
        for line in BufReader::new(socket).lines() {
            let line = line.unwrap();
            if let Some((_, reply)) = replies.iter().find(|(q, _)| *q == line) {
                writeln!(writer, "{}", reply).unwrap();
            }
            received.push(line);
        }
        received
    });
    (address, handle)
}

fn options() -> SessionOptions {
    SessionOptions::default().with_timeout(Duration::from_secs(5))
}

#[test]
fn blocking_session_uploads_waveform() {
    let (address, server) = serve(&[("*IDN?", "Agilent Technologies,33522B,MY1,1.0")]);

    let mut session = Session::open(&address, options()).unwrap();
    assert_eq!(session.resource(), address.replace("TCPIP::", "TCPIP0::"));
    assert_eq!(
        session.query("*IDN?").unwrap(),
        "Agilent Technologies,33522B,MY1,1.0"
    );
    let waveform = Waveform::new(vec![0.0, 0.5, -0.5, 1.0], 1000.0).unwrap();
    session
        .write_waveform(&waveform, &UploadOptions::default())
        .unwrap();
    session.close().unwrap();
    session.close().unwrap();
    assert!(!session.is_open());
    assert!(matches!(session.write("*RST"), Err(ProtoError::Closed)));

    assert_eq!(
        server.join().unwrap(),
        vec![
            "*IDN?",
            "FUNC:ARB:SRAT 1000.0",
            "DATA:ARB func,0.0,0.5,-0.5,1.0",
            "FUNC:ARB func",
        ]
    );
}

#[test]
fn blocking_generator_settings() {
    let (address, server) = serve(&[("SOUR2:FUNC?", "RAMP")]);

    let mut dev = FunctionGenerator::open(&address, options())
        .unwrap()
        .with_channel(2);
    dev.set_function(Function::Ramp).unwrap();
    assert_eq!(dev.function().unwrap(), Function::Ramp);
    dev.set_output(true).unwrap();
    drop(dev);

    assert_eq!(
        server.join().unwrap(),
        vec!["SOUR2:FUNC RAMP", "SOUR2:FUNC?", "OUTP2 ON"]
    );
}
