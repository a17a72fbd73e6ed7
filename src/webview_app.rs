use tao::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};
use wry::WebViewBuilder;

/// Open a native WebView window loading the fretboard page at `url`, sized
/// to fit a `board_width` x `board_height` canvas plus the controls.
///
/// Runs the tao event loop on the current thread and never returns
/// (exits the process when the window is closed).
pub fn run(url: &str, board_width: f64, board_height: f64) -> ! {
    let event_loop = EventLoop::new();

    let width = (board_width + 120.0).max(480.0);
    let height = (board_height + 200.0).max(360.0);
    let window = WindowBuilder::new()
        .with_title("Fretboard")
        .with_inner_size(tao::dpi::LogicalSize::new(width, height))
        .with_min_inner_size(tao::dpi::LogicalSize::new(480.0, 360.0))
        .build(&event_loop)
        .expect("Failed to create window");

    let _webview = WebViewBuilder::new()
        .with_url(url)
        .build(&window)
        .expect("Failed to create WebView");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        if let Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } = event
        {
            *control_flow = ControlFlow::Exit;
        }
    })
}
