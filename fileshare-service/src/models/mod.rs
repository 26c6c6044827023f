mod file;
mod group;
mod user;

pub use file::{blob_key, File, UploadFileInput, MAX_FILE_SIZE};
pub use group::{AddMemberInput, CreateGroupInput, Group, Membership, Role};
pub use user::{ChangePasswordInput, RegisterUserInput, User, UserResponse, MIN_PASSWORD_LENGTH};
