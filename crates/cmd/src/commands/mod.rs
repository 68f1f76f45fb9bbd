pub mod cat;
pub mod init;
pub mod list;
pub mod mkdir;
pub mod mount;
pub mod mv;
pub mod rm;
pub mod watch;
pub mod write;

pub use cat::cat_command;
pub use init::init_command;
pub use list::list_command;
pub use mkdir::mkdir_command;
pub use mount::{mount_command, mounts_command, unmount_command};
pub use mv::mv_command;
pub use rm::rm_command;
pub use watch::watch_command;
pub use write::write_command;
