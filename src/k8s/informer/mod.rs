pub mod config;
pub mod dispatcher;
pub mod event;
pub mod filter;
pub mod mirror;
pub mod object;
pub mod source;
pub mod subscriber;
pub mod watcher;

pub use config::WatcherConfig;
pub use dispatcher::{DispatchReport, Dispatcher, Outcome};
pub use event::{ChangeEvent, normalize};
pub use filter::is_significant;
pub use mirror::{Listing, MirrorStore, RawNotification, WatchNotice};
pub use object::{ObjectKey, TaggedObject, TypeTag, WatchedResource};
pub use source::{ApiSource, CollectionSource, NoticeStream};
pub use subscriber::{RecycleBin, SearchIndex, Subscribers};
pub use watcher::{Informer, InformerHandle, SessionState, WatchExit, WatchStats};
