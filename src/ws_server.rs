use crate::types::{CompactFrame, FrameUpdate, InputEvent, PageId, PointerKind};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use serde::Deserialize;
use sha1_smol::Sha1;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Largest client message accepted. Page messages are tiny.
const MAX_PAYLOAD: u64 = 64 * 1024;

const OP_CONTINUATION: u8 = 0x0;
const OP_TEXT: u8 = 0x1;
const OP_CLOSE: u8 = 0x8;
const OP_PING: u8 = 0x9;
const OP_PONG: u8 = 0xA;

/// Combined HTTP + WebSocket server.
///
/// - `GET /` or `GET /index.html` → the fretboard page
/// - `GET /fretboard.svg` → the bare SVG
/// - WebSocket upgrade → page events in, frame updates out
///
/// Single port, no separate HTTP server needed.
pub struct WsServer {
    listener: TcpListener,
    frame_rx: Receiver<FrameUpdate>,
    input_tx: Sender<InputEvent>,
    max_fps: u32,
    page: Arc<String>,
    svg: Arc<String>,
}

/// Messages the page sends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Hover { string: usize, fret: usize },
    Click { string: usize, fret: usize },
    Mode { value: String },
    Chord,
    Frame { t: f64 },
    Pause,
    Resume,
}

impl ClientMessage {
    /// The coordinator event for this message from `page`.
    pub fn into_event(self, page: PageId) -> InputEvent {
        match self {
            ClientMessage::Hover { string, fret } => InputEvent::Pointer {
                string,
                offset: fret,
                kind: PointerKind::Hover,
            },
            ClientMessage::Click { string, fret } => InputEvent::Pointer {
                string,
                offset: fret,
                kind: PointerKind::Click,
            },
            ClientMessage::Mode { value } => InputEvent::SelectMode(value),
            ClientMessage::Chord => InputEvent::ChordTrigger,
            ClientMessage::Frame { t } => InputEvent::Frame { page, t_ms: t },
            ClientMessage::Pause => InputEvent::PauseAnimation(page),
            ClientMessage::Resume => InputEvent::ResumeAnimation(page),
        }
    }
}

struct WsClient {
    stream: TcpStream,
    alive: bool,
}

impl WsClient {
    fn new(stream: TcpStream) -> Self {
        // The reader thread owns a clone of this socket, so it stays blocking;
        // a short write timeout keeps one stuck page from stalling the rest.
        let _ = stream.set_nodelay(true);
        let _ = stream.set_write_timeout(Some(Duration::from_millis(100)));
        Self {
            stream,
            alive: true,
        }
    }

    fn send_text(&mut self, text: &str) -> bool {
        let frame = encode_frame(OP_TEXT, text.as_bytes());
        match self.stream.write_all(&frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping WebSocket client: {}", e);
                self.close();
                false
            }
        }
    }

    /// Shut the socket down both ways so the reader thread ends too and the
    /// page sees the close.
    fn close(&mut self) {
        self.alive = false;
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

type ClientList = Arc<Mutex<Vec<WsClient>>>;

/// Unmasked server frame with FIN set.
pub fn encode_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(10 + len);
    frame.push(0x80 | opcode);
    if len < 126 {
        frame.push(len as u8);
    } else if len < 65536 {
        frame.push(126);
        let _ = frame.write_u16::<BigEndian>(len as u16);
    } else {
        frame.push(127);
        let _ = frame.write_u64::<BigEndian>(len as u64);
    }
    frame.extend_from_slice(payload);
    frame
}

/// One decoded frame, mask already removed.
#[derive(Debug, PartialEq)]
pub struct WsFrame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

pub fn read_frame<R: Read>(r: &mut R) -> io::Result<WsFrame> {
    let b0 = r.read_u8()?;
    let b1 = r.read_u8()?;
    let len = match b1 & 0x7F {
        126 => r.read_u16::<BigEndian>()? as u64,
        127 => r.read_u64::<BigEndian>()?,
        n => n as u64,
    };
    if len > MAX_PAYLOAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }
    let mask = if b1 & 0x80 != 0 {
        let mut m = [0u8; 4];
        r.read_exact(&mut m)?;
        Some(m)
    } else {
        None
    };
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    if let Some(m) = mask {
        for (i, b) in payload.iter_mut().enumerate() {
            *b ^= m[i % 4];
        }
    }
    Ok(WsFrame {
        fin: b0 & 0x80 != 0,
        opcode: b0 & 0x0F,
        payload,
    })
}

/// Parsed HTTP request — enough to decide WS vs HTTP.
struct HttpRequest {
    path: String,
    is_upgrade: bool,
    ws_key: Option<String>,
}

fn parse_request(stream: &mut TcpStream) -> Result<HttpRequest, String> {
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| e.to_string())?);
    let mut path = String::from("/");
    let mut is_upgrade = false;
    let mut ws_key = None;
    let mut first = true;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).map_err(|e| e.to_string())?;
        let trimmed = line.trim().to_string();
        if n == 0 || trimmed.is_empty() {
            break;
        }
        if first {
            // "GET /path HTTP/1.1"
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() >= 2 {
                path = parts[1].to_string();
            }
            first = false;
        }
        let lower = trimmed.to_lowercase();
        if lower.starts_with("upgrade:") && lower.contains("websocket") {
            is_upgrade = true;
        }
        if lower.starts_with("sec-websocket-key:") {
            ws_key = Some(trimmed[18..].trim().to_string());
        }
    }
    Ok(HttpRequest {
        path,
        is_upgrade,
        ws_key,
    })
}

/// `Sec-WebSocket-Accept` value for a client key.
pub fn accept_key(key: &str) -> String {
    let magic = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
    let mut hasher = Sha1::new();
    hasher.update(format!("{}{}", key, magic).as_bytes());
    base64_encode(&hasher.digest().bytes())
}

fn ws_handshake(stream: &mut TcpStream, key: &str) -> Result<(), String> {
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept_key(key)
    );
    stream
        .write_all(response.as_bytes())
        .map_err(|e| e.to_string())
}

fn serve_static(stream: &mut TcpStream, content: &[u8], content_type: &str) {
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         Cache-Control: no-cache\r\n\
         \r\n",
        content_type,
        content.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(content);
}

fn serve_404(stream: &mut TcpStream) {
    let body = b"<h1>404</h1><p>Open <a href=\"/\">/</a> for the fretboard</p>";
    let header = format!(
        "HTTP/1.1 404 Not Found\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}

fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut result = String::new();
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        result.push(CHARS[((triple >> 18) & 0x3F) as usize] as char);
        result.push(CHARS[((triple >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            result.push(CHARS[((triple >> 6) & 0x3F) as usize] as char);
        } else {
            result.push('=');
        }
        if chunk.len() > 2 {
            result.push(CHARS[(triple & 0x3F) as usize] as char);
        } else {
            result.push('=');
        }
    }
    result
}

/// Read page messages until the socket closes, forwarding each as an
/// `InputEvent`. Fragmented text messages are reassembled.
fn read_client(mut stream: TcpStream, page: PageId, input_tx: &Sender<InputEvent>) {
    let mut message: Vec<u8> = Vec::new();
    loop {
        let frame = match read_frame(&mut stream) {
            Ok(f) => f,
            Err(e) => {
                debug!("WebSocket read ended: {}", e);
                break;
            }
        };
        match frame.opcode {
            OP_TEXT | OP_CONTINUATION => {
                message.extend_from_slice(&frame.payload);
                if !frame.fin {
                    continue;
                }
                let text = String::from_utf8_lossy(&message).into_owned();
                message.clear();
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        if input_tx.send(msg.into_event(page)).is_err() {
                            // coordinator gone
                            break;
                        }
                    }
                    Err(e) => warn!("Bad page message {:?}: {}", text, e),
                }
            }
            OP_PING => {
                let _ = stream.write_all(&encode_frame(OP_PONG, &frame.payload));
            }
            OP_CLOSE => {
                let _ = stream.write_all(&encode_frame(OP_CLOSE, &[]));
                break;
            }
            _ => {}
        }
    }
    info!("WebSocket client {} disconnected", page);
}

impl WsServer {
    /// Bind now so the caller knows the port is ours before the window opens.
    pub fn bind(
        addr: &str,
        frame_rx: Receiver<FrameUpdate>,
        input_tx: Sender<InputEvent>,
        max_fps: u32,
        page: String,
        svg: String,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            frame_rx,
            input_tx,
            max_fps,
            page: Arc::new(page),
            svg: Arc::new(svg),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections on a background thread and broadcast frames on
    /// this one until the frame channel closes.
    pub fn run(self) {
        let clients: ClientList = Arc::new(Mutex::new(Vec::new()));
        match self.listener.local_addr() {
            Ok(a) => info!("Server listening on http://{}", a),
            Err(e) => error!("Server has no local address: {}", e),
        }

        let accept_clients = clients.clone();
        let listener = self.listener;
        let page = self.page.clone();
        let svg = self.svg.clone();
        let input_tx = self.input_tx.clone();
        let spawned = thread::Builder::new()
            .name("ws-accept".into())
            .spawn(move || {
                let mut next_page: PageId = 0;
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => {
                            next_page += 1;
                            let id = next_page;
                            let cl = accept_clients.clone();
                            let page = page.clone();
                            let svg = svg.clone();
                            let tx = input_tx.clone();
                            // HTTP connections close immediately; WS connections
                            // get a reader thread and a slot in the client list
                            thread::spawn(move || handle_connection(stream, id, cl, &page, &svg, tx));
                        }
                        Err(e) => warn!("TCP accept error: {}", e),
                    }
                }
            });
        if let Err(e) = spawned {
            error!("Could not spawn acceptor: {}", e);
            return;
        }

        // Broadcast loop, throttled to max_fps
        let fps = self.max_fps.max(1) as u64;
        let frame_interval = Duration::from_micros(1_000_000 / fps);
        let mut last_send: Option<Instant> = None;
        let mut mode_changed = false;

        for frame in self.frame_rx.iter() {
            // latch mode edges across skipped frames
            mode_changed |= frame.mode_changed;
            let now = Instant::now();
            if last_send.is_some_and(|t| now.duration_since(t) < frame_interval) {
                continue;
            }
            last_send = Some(now);

            let mut compact = CompactFrame::from(&frame);
            compact.mc = mode_changed;
            mode_changed = false;
            let json = match serde_json::to_string(&compact) {
                Ok(j) => j,
                Err(e) => {
                    warn!("JSON serialize error: {}", e);
                    continue;
                }
            };

            let Ok(mut cl) = clients.lock() else {
                error!("Client list poisoned, broadcast stopping");
                return;
            };
            for client in cl.iter_mut() {
                client.send_text(&json);
            }
            cl.retain(|c| c.alive);
        }
        info!("Frame channel closed, server broadcast stopping");
    }
}

fn handle_connection(
    mut stream: TcpStream,
    id: PageId,
    clients: ClientList,
    page: &str,
    svg: &str,
    input_tx: Sender<InputEvent>,
) {
    match parse_request(&mut stream) {
        Ok(req) if req.is_upgrade => {
            let Some(key) = req.ws_key else {
                warn!("WebSocket upgrade without key");
                return;
            };
            if let Err(e) = ws_handshake(&mut stream, &key) {
                warn!("WS handshake failed: {}", e);
                return;
            }
            let reader = match stream.try_clone() {
                Ok(r) => r,
                Err(e) => {
                    warn!("Could not clone client socket: {}", e);
                    return;
                }
            };
            info!("WebSocket client {} connected", id);
            match clients.lock() {
                Ok(mut cl) => cl.push(WsClient::new(stream)),
                Err(_) => return,
            }
            if input_tx.send(InputEvent::PageOpened(id)).is_err() {
                return;
            }
            read_client(reader, id, &input_tx);
            let _ = input_tx.send(InputEvent::PageClosed(id));
        }
        Ok(req) => match req.path.as_str() {
            "/" | "/index.html" => serve_static(&mut stream, page.as_bytes(), "text/html; charset=utf-8"),
            "/fretboard.svg" => serve_static(&mut stream, svg.as_bytes(), "image/svg+xml"),
            _ => serve_404(&mut stream),
        },
        Err(e) => warn!("Request parse error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn masked(opcode: u8, fin: bool, payload: &[u8]) -> Vec<u8> {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let fin_bit: u8 = if fin { 0x80 } else { 0 };
        let mut f = vec![fin_bit | opcode];
        if payload.len() < 126 {
            f.push(0x80 | payload.len() as u8);
        } else {
            f.push(0x80 | 126);
            f.write_u16::<BigEndian>(payload.len() as u16).unwrap();
        }
        f.extend_from_slice(&mask);
        f.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        f
    }

    #[test]
    fn test_accept_key_rfc_example() {
        assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9EzPzbmWbLFxZbo=");
    }

    #[test]
    fn test_read_masked_frames() {
        let mut bytes = masked(OP_TEXT, true, br#"{"type":"chord"}"#);
        let long = vec![b'a'; 300];
        bytes.extend(masked(OP_TEXT, true, &long));
        let mut cur = Cursor::new(bytes);

        let f = read_frame(&mut cur).unwrap();
        assert!(f.fin);
        assert_eq!(f.opcode, OP_TEXT);
        assert_eq!(f.payload, br#"{"type":"chord"}"#);
        assert_eq!(read_frame(&mut cur).unwrap().payload, long);
        assert!(read_frame(&mut cur).is_err());
    }

    #[test]
    fn test_encode_lengths() {
        assert_eq!(encode_frame(OP_TEXT, b"hi"), vec![0x81, 2, b'h', b'i']);
        let mid = encode_frame(OP_TEXT, &[0; 300]);
        assert_eq!(&mid[..4], &[0x81, 126, 0x01, 0x2C]);
        let big = encode_frame(OP_TEXT, &vec![0; 70_000]);
        assert_eq!(big[1], 127);
        assert_eq!(big.len(), 10 + 70_000);
        // server frames decode with the same reader
        assert_eq!(read_frame(&mut Cursor::new(mid)).unwrap().payload.len(), 300);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut f = vec![0x81, 127];
        f.write_u64::<BigEndian>(MAX_PAYLOAD + 1).unwrap();
        assert!(read_frame(&mut Cursor::new(f)).is_err());
    }

    #[test]
    fn test_client_messages() {
        let parse = |s: &str| serde_json::from_str::<ClientMessage>(s).unwrap().into_event(3);
        assert_eq!(
            parse(r#"{"type":"hover","string":2,"fret":5}"#),
            InputEvent::Pointer { string: 2, offset: 5, kind: PointerKind::Hover }
        );
        assert_eq!(
            parse(r#"{"type":"click","string":0,"fret":0}"#),
            InputEvent::Pointer { string: 0, offset: 0, kind: PointerKind::Click }
        );
        assert_eq!(parse(r#"{"type":"mode","value":"strum"}"#), InputEvent::SelectMode("strum".into()));
        assert_eq!(parse(r#"{"type":"chord"}"#), InputEvent::ChordTrigger);
        assert_eq!(parse(r#"{"type":"frame","t":16.5}"#), InputEvent::Frame { page: 3, t_ms: 16.5 });
        assert_eq!(parse(r#"{"type":"pause"}"#), InputEvent::PauseAnimation(3));
        assert_eq!(parse(r#"{"type":"resume"}"#), InputEvent::ResumeAnimation(3));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"slap"}"#).is_err());
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_encode(b""), "");
    }
}
