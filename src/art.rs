use rand::seq::SliceRandom;

/// Splash art shown to a session before it has been matched. Picked once,
/// at session creation, and held immutable for the life of the connection.
const ARTS: &[&str] = &[
    r#"
                  ___           ___           ___           ___           ___
      ___        /  /\         /  /\         /__/\         /  /\         /  /\
     /  /\      /  /:/_       /  /::\       |  |::\       /  /:/_       /  /:/_
    /  /:/     /  /:/ /\     /  /:/\:\      |  |:|:\     /  /:/ /\     /  /:/ /\
   /  /:/     /  /:/ /:/_   /  /:/~/:/    __|__|:|\:\   /  /:/ /:/_   /  /:/_/::\
  /  /::\    /__/:/ /:/ /\ /__/:/ /:/___ /__/::::| \:\ /__/:/ /:/ /\ /__/:/__\/\:\
 /__/:/\:\   \  \:\/:/ /:/ \  \:\/:::::/ \  \:\~~\__\/ \  \:\/:/ /:/ \  \:\ /~~/:/
 \__\/  \:\   \  \::/ /:/   \  \::/~~~~   \  \:\        \  \::/ /:/   \  \:\  /:/
      \  \:\   \  \:\/:/     \  \:\        \  \:\        \  \:\/:/     \  \:\/:/
       \__\/    \  \::/       \  \:\        \  \:\        \  \::/       \  \::/
                 \__\/         \__\/         \__\/         \__\/         \__\/
"#,
    r#"
   ___      ___    ___     _      ___    ___
  | _ \\__ | _ \  / __|   / |    / _ \  | _ \
  |  _/ _ \|   /  \__ \ __| |   | (_) | |   /
  |_| \__/ |_|_\  |___/____|    \___/  |_|_\
"#,
];

pub fn pick() -> &'static str {
    ARTS.choose(&mut rand::thread_rng()).copied().unwrap_or(ARTS[0])
}
