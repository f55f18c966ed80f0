//! Test utilities for cartograph crates

use std::fs;

use tempfile::TempDir;

/// Create a temporary repository containing `files`, given as `(relative path, contents)`.
pub fn create_repo_with_structure(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }

    temp_dir
}

/// A small TypeScript project with a package.json, a tsconfig and a handful of modules.
pub fn create_sample_project() -> TempDir {
    create_repo_with_structure(&[
        (
            "package.json",
            r#"{
  "name": "sample-app",
  "version": "1.0.0",
  "main": "dist/index.js",
  "types": "dist/index.d.ts",
  "bin": { "sample": "dist/cli.js" },
  "scripts": { "build": "tsc", "test": "vitest run" },
  "dependencies": { "react": "^18.2.0", "zod": "^3.22.0" },
  "devDependencies": { "typescript": "^5.4.0", "vitest": "^1.5.0", "eslint": "^8.57.0", "prettier": "^3.2.0", "vite": "^5.2.0" }
}
"#,
        ),
        ("package-lock.json", "{}\n"),
        (
            "tsconfig.json",
            r#"{
  // project settings
  "compilerOptions": { "strict": true, "paths": { "@/*": ["src/*"] } }
}
"#,
        ),
        (
            "src/index.ts",
            r#"export { UserService } from './services/user';
export * from './utils/format';

export async function main(): Promise<void> {
  const service = new UserService();
  await service.loadUsers();
}
"#,
        ),
        (
            "src/services/user.ts",
            r#"import { formatName } from '../utils/format';
import { z } from 'zod';

export interface User {
  id: string;
  name: string;
}

export class UserService {
  private users: User[] = [];

  async loadUsers(): Promise<User[]> {
    try {
      const response = await fetch('/api/users');
      this.users = await response.json();
    } catch (err) {
      throw new Error('failed to load users');
    }
    return this.users;
  }

  displayName(user: User): string {
    return formatName(user.name);
  }
}
"#,
        ),
        (
            "src/utils/format.ts",
            r#"export function formatName(name: string, upper?: boolean): string {
  return upper ? name.toUpperCase() : name;
}

export const slugify = (value: string): string => value.toLowerCase().replace(/\s+/g, '-');
"#,
        ),
        ("node_modules/react/index.js", "module.exports = {};\n"),
        ("dist/index.js", "exports.main = function () {};\n"),
    ])
}
