// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented tandem.yml template.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

/// Starting point written by `tandem init`.
pub const TEMPLATE: &str = r#"# Host to deploy to: "user@host:port", or the detailed form below.
target:
  host: server.example.com
  port: 22
  user: root
  # Password is read from the environment, never stored here.
  # password: { env: TANDEM_SSH_PASSWORD }
  # key_path: ~/.ssh/id_ed25519
  # SSH host key verification (default: false)
  # Set to true to enable Trust-On-First-Use, or pre-populate ~/.ssh/known_hosts
  # trust_first_connection: true
  keepalive: 30s
  # Commands run to completion unless a limit is set
  # command_timeout: 2h

remote_root: /opt/my-app
source: .

exclude:
  directories: [node_modules, .git, .next, target, __pycache__]
  files: [.env.local, .DS_Store]

dependencies:
  - name: node
    check: node --version
    install:
      - curl -fsSL https://deb.nodesource.com/setup_20.x | bash -
      - apt-get install -y nodejs

builds:
  - name: web
    dir: web
    clean: .next
    install: npm install
    build: npm run build

services:
  - name: my-app-web
    description: My app web front end
    working_dir: web
    exec: /usr/bin/npm start
    restart: always
    env:
      NODE_ENV: production
      PORT: "3000"

proxy:
  name: my-app
  listen: 80
  upstream: 3000
  # disable_default: true

health:
  port: 3000
  attempts: 5
  interval: 3s

verify:
  build_output: web/.next
  env_file: web/.env.local

# destinations:
#   staging:
#     target: root@staging.example.com
#     env:
#       NODE_ENV: staging
"#;

/// Write the template into `dir`. Returns the path written.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    Ok(config_path)
}
