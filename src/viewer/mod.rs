pub mod highlights;

const ZOOM_STEP: f32 = 1.2;
const DEFAULT_SCALE: f32 = 1.0;

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    LocalFile(String),
    RemoteUrl(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerState {
    Closed,
    Loading { source: DocumentSource },
    Ready(DocumentView),
    Failed { message: String },
}

/// An open document. Fields only move through [`PdfViewer`] operations,
/// which keep the page inside `[1, num_pages]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    num_pages: u32,
    page: u32,
    scale: f32,
    rendering: bool,
    pending: Option<u32>,
}

impl DocumentView {
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.pending
    }
}

/// What the embedder must do after an operation: draw a page, nothing yet
/// (the request sits in the pending slot), or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderAction {
    Start { page: u32, scale: f32 },
    Deferred,
    NoOp,
}

/// Document lifecycle and page-render scheduling for a paginated viewer.
///
/// Rendering is single-flight: while a page is being drawn, navigation and
/// zoom requests collapse into one pending slot, last write wins. The
/// embedder drives the machine by reporting `render_complete` /
/// `render_failed` after each `RenderAction::Start`.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfViewer {
    state: ViewerState,
}

impl PdfViewer {
    pub fn new() -> Self {
        Self { state: ViewerState::Closed }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn view(&self) -> Option<&DocumentView> {
        match &self.state {
            ViewerState::Ready(view) => Some(view),
            _ => None,
        }
    }

    /// Begin loading a document, replacing whatever was open.
    pub fn open(&mut self, source: DocumentSource) {
        self.state = ViewerState::Loading { source };
    }

    /// The document finished loading; page 1 starts rendering immediately.
    pub fn document_loaded(&mut self, num_pages: u32) -> RenderAction {
        match &self.state {
            ViewerState::Loading { .. } if num_pages == 0 => {
                self.state = ViewerState::Failed {
                    message: "document has no pages".to_string(),
                };
                RenderAction::NoOp
            }
            ViewerState::Loading { .. } => {
                let view = DocumentView {
                    num_pages,
                    page: 1,
                    scale: DEFAULT_SCALE,
                    rendering: true,
                    pending: None,
                };
                let action = RenderAction::Start { page: 1, scale: view.scale };
                self.state = ViewerState::Ready(view);
                action
            }
            _ => RenderAction::NoOp,
        }
    }

    pub fn document_failed(&mut self, message: impl Into<String>) {
        self.state = ViewerState::Failed { message: message.into() };
    }

    pub fn close(&mut self) {
        self.state = ViewerState::Closed;
    }

    pub fn next_page(&mut self) -> RenderAction {
        match &mut self.state {
            ViewerState::Ready(view) if view.page < view.num_pages => {
                let target = view.page + 1;
                Self::queue(view, target)
            }
            _ => RenderAction::NoOp,
        }
    }

    pub fn prev_page(&mut self) -> RenderAction {
        match &mut self.state {
            ViewerState::Ready(view) if view.page > 1 => {
                let target = view.page - 1;
                Self::queue(view, target)
            }
            _ => RenderAction::NoOp,
        }
    }

    /// Jump to a page; out-of-range targets clamp to `[1, num_pages]`.
    pub fn go_to_page(&mut self, target: u32) -> RenderAction {
        match &mut self.state {
            ViewerState::Ready(view) => {
                let target = target.clamp(1, view.num_pages);
                if !view.rendering && target == view.page {
                    return RenderAction::NoOp;
                }
                Self::queue(view, target)
            }
            _ => RenderAction::NoOp,
        }
    }

    pub fn zoom_in(&mut self) -> RenderAction {
        self.rescale(ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> RenderAction {
        self.rescale(1.0 / ZOOM_STEP)
    }

    /// The in-flight render finished. If a request was deferred meanwhile,
    /// it becomes current and starts rendering right away.
    pub fn render_complete(&mut self) -> RenderAction {
        match &mut self.state {
            ViewerState::Ready(view) if view.rendering => match view.pending.take() {
                Some(page) => {
                    view.page = page;
                    RenderAction::Start { page, scale: view.scale }
                }
                None => {
                    view.rendering = false;
                    RenderAction::NoOp
                }
            },
            _ => RenderAction::NoOp,
        }
    }

    /// The in-flight render failed. The pending slot is dropped with it; the
    /// next navigation starts fresh.
    pub fn render_failed(&mut self, message: &str) {
        if let ViewerState::Ready(view) = &mut self.state {
            tracing::warn!(message, page = view.page, "page render failed");
            view.rendering = false;
            view.pending = None;
        }
    }

    fn rescale(&mut self, factor: f32) -> RenderAction {
        match &mut self.state {
            ViewerState::Ready(view) => {
                view.scale *= factor;
                let target = view.page;
                Self::queue(view, target)
            }
            _ => RenderAction::NoOp,
        }
    }

    fn queue(view: &mut DocumentView, target: u32) -> RenderAction {
        if view.rendering {
            // Last write wins; an earlier deferred target is dropped.
            view.pending = Some(target);
            RenderAction::Deferred
        } else {
            view.page = target;
            view.rendering = true;
            RenderAction::Start { page: target, scale: view.scale }
        }
    }
}

impl Default for PdfViewer {
    fn default() -> Self {
        Self::new()
    }
}
