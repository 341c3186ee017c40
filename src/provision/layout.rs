// Files every server directory gets: launch script, EULA acceptance, server.properties

use std::path::Path;

use chrono::Utc;

use crate::constants::DEFAULT_XMS_MB;
use crate::model::{JavaInstallation, ServerType};

use super::LaunchTarget;

/// Stock server.properties entries, in the order the vanilla server writes them.
const DEFAULT_PROPERTIES: &[(&str, &str)] = &[
    ("max-players", "20"),
    ("online-mode", "true"),
    ("white-list", "false"),
    ("level-name", "world"),
    ("level-type", "minecraft\\:normal"),
    ("gamemode", "survival"),
    ("difficulty", "easy"),
    ("hardcore", "false"),
    ("pvp", "true"),
    ("spawn-protection", "16"),
    ("spawn-monsters", "true"),
    ("spawn-animals", "true"),
    ("spawn-npcs", "true"),
    ("allow-nether", "true"),
    ("allow-flight", "false"),
    ("enable-command-block", "false"),
    ("max-world-size", "29999984"),
    ("view-distance", "10"),
    ("resource-pack", ""),
    ("resource-pack-sha1", ""),
    ("motd", "A Minecraft Server"),
];

/// Single-quote `value` for POSIX sh.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// `start.sh` launching the server from its own directory.
pub fn start_script(java: &JavaInstallation, ram_mb: u32, port: u16, target: &LaunchTarget) -> String {
    let xms = DEFAULT_XMS_MB.min(ram_mb);
    let launch = match target {
        LaunchTarget::Jar(jar) => format!("-jar {}", shell_quote(&jar.to_string_lossy())),
        LaunchTarget::ArgsFile(args) => format!("@{}", shell_quote(&args.to_string_lossy())),
    };

    format!(
        "#!/bin/sh\n\
         # Generated by svforge\n\
         cd \"$(dirname \"$0\")\" || exit 1\n\
         exec {java} -Xmx{ram}M -Xms{xms}M {launch} --port {port} nogui \"$@\"\n",
        java = shell_quote(&java.executable_path.to_string_lossy()),
        ram = ram_mb,
        xms = xms,
        launch = launch,
        port = port,
    )
}

pub fn eula() -> String {
    format!(
        "#By changing the setting below to TRUE you are indicating your agreement to the EULA (https://aka.ms/MinecraftEULA).\n\
         #{}\n\
         eula=true\n",
        Utc::now().format("%a %b %d %H:%M:%S UTC %Y")
    )
}

/// Defaults plus the requested port; Leaf gets its own motd and simulation distance.
pub fn server_properties(server_type: ServerType, port: u16) -> String {
    let mut out = String::from("#Minecraft server properties\n#Generated by svforge\n");
    out.push_str(&format!("server-port={}\n", port));

    for (key, value) in DEFAULT_PROPERTIES {
        let value = match (server_type, *key) {
            (ServerType::Leaf, "motd") => "A Minecraft Server powered by Leaf",
            _ => *value,
        };
        out.push_str(&format!("{}={}\n", key, value));
    }

    if server_type == ServerType::Leaf {
        out.push_str("simulation-distance=10\n");
    }
    out
}

/// Write `contents` and mark the file executable.
pub fn write_executable(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn java() -> JavaInstallation {
        JavaInstallation {
            major_version: 21,
            executable_path: PathBuf::from("/usr/lib/jvm/java-21-openjdk/bin/java"),
            is_managed: false,
        }
    }

    #[test]
    fn test_start_script_embeds_java_ram_and_port() {
        let script = start_script(
            &java(),
            4096,
            25566,
            &LaunchTarget::Jar(PathBuf::from("paper-1.21.8-60.jar")),
        );
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("'/usr/lib/jvm/java-21-openjdk/bin/java'"));
        assert!(script.contains("-Xmx4096M -Xms512M"));
        assert!(script.contains("-jar 'paper-1.21.8-60.jar' --port 25566 nogui"));
    }

    #[test]
    fn test_small_heap_lowers_initial_heap() {
        let script = start_script(&java(), 512, 25565, &LaunchTarget::Jar(PathBuf::from("s.jar")));
        assert!(script.contains("-Xmx512M -Xms512M"));
    }

    #[test]
    fn test_args_file_launch() {
        let script = start_script(
            &java(),
            2048,
            25565,
            &LaunchTarget::ArgsFile(PathBuf::from(
                "libraries/net/minecraftforge/forge/1.20.1-47.4.0/unix_args.txt",
            )),
        );
        assert!(script.contains("@'libraries/net/minecraftforge/forge/1.20.1-47.4.0/unix_args.txt'"));
        assert!(!script.contains("-jar"));
    }

    #[test]
    fn test_quotes_paths_with_spaces_and_quotes() {
        assert_eq!(shell_quote("/opt/my java/bin/java"), "'/opt/my java/bin/java'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_properties() {
        let props = server_properties(ServerType::Paper, 25566);
        assert!(props.contains("server-port=25566\n"));
        assert!(props.contains("max-players=20\n"));
        assert!(props.contains("motd=A Minecraft Server\n"));
        assert!(!props.contains("simulation-distance"));

        let leaf = server_properties(ServerType::Leaf, 25565);
        assert!(leaf.contains("motd=A Minecraft Server powered by Leaf\n"));
        assert!(leaf.contains("simulation-distance=10\n"));
    }

    #[test]
    fn test_eula_is_accepted() {
        assert!(eula().ends_with("eula=true\n"));
    }
}
