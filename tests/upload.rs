use bytes::Bytes;
use csv_upload_relay::{server, Config};
use futures::{stream, Stream};
use http::{header, Request, StatusCode};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, net::SocketAddr};
use tokio::net::{TcpListener, TcpStream};

const BOUNDARY: &str = "----relay-test-7MA4YWxk";

const ROW: &[u8] = b"1042,Jane Doe,jane@example.org,\"Main St. 5\",+31 (0)20 123456\r\n";

async fn start() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config {
        validation_bytes: 100,
        bind_addr: addr,
    };

    tokio::spawn(server::serve(listener, config));
    addr
}

fn head() -> Bytes {
    format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
         nightly export\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"users.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n",
        b = BOUNDARY
    )
    .into()
}

fn tail() -> Bytes {
    format!("\r\n--{}--\r\n", BOUNDARY).into()
}

/// Posts a form whose `file` part is made of `content`, one frame per item.
async fn post<I>(addr: SocketAddr, content: I) -> hyper::Response<Incoming>
where
    I: Iterator<Item = Bytes> + Send + 'static,
{
    let frames = std::iter::once(head())
        .chain(content)
        .chain(std::iter::once(tail()))
        .map(|b| Ok::<_, Infallible>(Frame::data(b)));

    send(addr, stream::iter(frames)).await
}

async fn send<S>(addr: SocketAddr, frames: S) -> hyper::Response<Incoming>
where
    S: Stream<Item = Result<Frame<Bytes>, Infallible>> + Send + 'static,
{
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();

    tokio::spawn(async move {
        // The server may hang up on a rejected upload mid-body.
        let _ = conn.await;
    });

    let req = Request::post(server::UPLOAD_PATH)
        .header(header::HOST, addr.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(StreamBody::new(frames))
        .unwrap();

    sender.send_request(req).await.unwrap()
}

fn split(data: &[u8], frame_size: usize) -> std::vec::IntoIter<Bytes> {
    data.chunks(frame_size)
        .map(Bytes::copy_from_slice)
        .collect::<Vec<_>>()
        .into_iter()
}

async fn body_of(res: hyper::Response<Incoming>) -> Bytes {
    res.into_body().collect().await.unwrap().to_bytes()
}

/// Reads the response frame by frame and checks it against repeated `ROW`s
/// without holding on to it. Returns the number of bytes received.
async fn verify_rows(res: hyper::Response<Incoming>) -> usize {
    let mut body = res.into_body();
    let mut offset = 0;

    while let Some(frame) = body.frame().await {
        let frame = frame.unwrap();
        if let Some(data) = frame.data_ref() {
            for (i, b) in data.iter().enumerate() {
                assert_eq!(ROW[(offset + i) % ROW.len()], *b, "byte {}", offset + i);
            }
            offset += data.len();
        }
    }

    offset
}

/// Lazily yields `total` bytes of repeated rows in frames of about 64 KiB.
fn rows(total: usize) -> impl Iterator<Item = Bytes> + Send + 'static {
    let frame = Bytes::from(ROW.repeat(64 * 1024 / ROW.len()));
    let n = total / frame.len();

    std::iter::repeat(frame).take(n)
}

#[tokio::test]
async fn small_csv_is_relayed() {
    let addr = start().await;
    let data = b"id,name\n1,Alice\n";

    let res = post(addr, split(data, 5)).await;

    assert_eq!(StatusCode::OK, res.status());
    assert_eq!("text/plain", res.headers()[header::CONTENT_TYPE]);
    assert_eq!(Bytes::from_static(data), body_of(res).await);
}

#[tokio::test]
async fn accepted_body_is_chunked() {
    let addr = start().await;

    let res = post(addr, split(ROW, 8)).await;

    assert_eq!(StatusCode::OK, res.status());
    assert!(res.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(
        "chunked",
        res.headers()[header::TRANSFER_ENCODING].to_str().unwrap()
    );
    assert_eq!(Bytes::from_static(ROW), body_of(res).await);
}

#[tokio::test]
async fn round_trip_25_bytes_any_frame_size() {
    let addr = start().await;
    let data = b"a,b,c\n1,2,3\n4,5,6\n7,8,9\n\n";
    assert_eq!(25, data.len());

    for frame_size in &[1, 2, 24, 25, 100] {
        let res = post(addr, split(data, *frame_size)).await;

        assert_eq!(StatusCode::OK, res.status());
        assert_eq!(Bytes::from_static(data), body_of(res).await);
    }
}

#[tokio::test]
async fn round_trip_4_3_mb() {
    let addr = start().await;
    let frames = rows(4_300_000);
    let expected: usize = rows(4_300_000).map(|f| f.len()).sum();

    let res = post(addr, frames).await;

    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(expected, verify_rows(res).await);
}

#[tokio::test]
async fn round_trip_86_mb() {
    let addr = start().await;
    let frames = rows(86_000_000);
    let expected: usize = rows(86_000_000).map(|f| f.len()).sum();

    let res = post(addr, frames).await;

    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(expected, verify_rows(res).await);
}

#[tokio::test]
async fn only_the_first_100_bytes_are_checked() {
    let addr = start().await;
    let mut data = ROW.repeat(2);
    data.extend_from_slice(&[0x00, 0xff, 0x1b, b'\n']);
    assert!(data.len() > 100);

    let res = post(addr, split(&data, 7)).await;

    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(data, body_of(res).await.to_vec());
}

#[tokio::test]
async fn binary_upload_is_rejected() {
    let addr = start().await;
    let mut data = vec![0u8; 1024];
    data[10..20].copy_from_slice(b"PK\x03\x04zipzip");

    let res = post(addr, split(&data, 256)).await;

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert_eq!("text/plain", res.headers()[header::CONTENT_TYPE]);
    assert_eq!(
        Bytes::from_static(b"Invalid CSV format: first 100 bytes contain invalid characters"),
        body_of(res).await
    );
}

#[tokio::test]
async fn control_byte_in_prefix_is_rejected() {
    let addr = start().await;
    let mut data = ROW.to_vec();
    data[50] = 0x07;

    let res = post(addr, split(&data, 16)).await;

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert_eq!(
        format!(
            "Invalid CSV format: first {} bytes contain invalid characters",
            data.len()
        ),
        String::from_utf8(body_of(res).await.to_vec()).unwrap()
    );
}

#[tokio::test]
async fn high_byte_in_prefix_is_rejected() {
    let addr = start().await;
    let mut data = ROW.repeat(3);
    data[99] = 0xe9;

    let res = post(addr, split(&data, 40)).await;

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert_eq!(
        Bytes::from_static(b"Invalid CSV format: first 100 bytes contain invalid characters"),
        body_of(res).await
    );
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let addr = start().await;

    let res = post(addr, std::iter::empty()).await;

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert_eq!(Bytes::from_static(b"Empty file"), body_of(res).await);
}

#[tokio::test]
async fn form_without_file_part() {
    let addr = start().await;
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nhi\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let frames = stream::iter(vec![Ok::<_, Infallible>(Frame::data(Bytes::from(body)))]);

    let res = send(addr, frames).await;

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert_eq!(
        Bytes::from_static(b"Required part 'file' is not present"),
        body_of(res).await
    );
}
